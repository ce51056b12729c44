mod probe_summary_tests;
mod render_tests;
mod telemetry_tests;
mod uri_tests;
