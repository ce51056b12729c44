//! Client configuration commands.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use vpstools_core::{
    ClientAppType, ClientConfigFormat, ClientConfiguration, ConfigurationCompiler, FileExportSink,
    VpsInstance, app_label, format_label, protocol_label,
};

use crate::cli::{ConfigCommands, OutputFormat};
use crate::error::CliError;
use crate::util::{Workspace, find_configuration, find_instance};

/// Config command handler
pub fn cmd_config(config_path: Option<&Path>, subcmd: ConfigCommands) -> Result<(), CliError> {
    let mut workspace = Workspace::open(config_path)?;

    match subcmd {
        ConfigCommands::List { vps, format } => cmd_list(&workspace, vps.as_deref(), format),
        ConfigCommands::Import { file } => cmd_import(&mut workspace, &file),
        ConfigCommands::ImportUri { vps, uri } => cmd_import_uri(&mut workspace, &vps, &uri),
        ConfigCommands::Render {
            target,
            vps,
            format,
            app,
        } => {
            tracing::debug!(
                format = format_label(format),
                app = app_label(app.unwrap_or_else(|| format.default_app())),
                "Rendering client document"
            );
            let rendered = if vps {
                let instances = workspace.instances();
                let instance = find_instance(&instances, &target)?;
                workspace.compiler.render_for_vps(instance.id, format, app)?
            } else {
                let id = resolve(&workspace, &target)?;
                workspace.compiler.render(id, format, app)?
            };
            println!("{rendered}");
            Ok(())
        }
        ConfigCommands::Url { target } => {
            let id = resolve(&workspace, &target)?;
            println!("{}", workspace.compiler.generate_protocol_url(id)?);
            Ok(())
        }
        ConfigCommands::Export {
            target,
            format,
            app,
            output,
        } => cmd_export(&workspace, &target, format, app, output),
        ConfigCommands::Delete { target } => {
            let id = resolve(&workspace, &target)?;
            let removed = workspace
                .compiler
                .remove(id)
                .ok_or_else(|| CliError::ConfigurationNotFound(target.clone()))?;
            workspace.save()?;
            println!("Deleted configuration '{}' ({})", removed.tag(), removed.id);
            Ok(())
        }
        ConfigCommands::Formats => {
            println!("{}", format_targets());
            Ok(())
        }
    }
}

fn resolve(workspace: &Workspace, target: &str) -> Result<uuid::Uuid, CliError> {
    let catalog = workspace.compiler.list();
    find_configuration(&catalog, target).map(|c| c.id)
}

fn cmd_list(workspace: &Workspace, vps: Option<&str>, format: OutputFormat) -> Result<(), CliError> {
    let instances = workspace.instances();
    let configurations = match vps {
        Some(name) => {
            let instance = find_instance(&instances, name)?;
            workspace.compiler.list_for_vps(instance.id)
        }
        None => workspace.compiler.list(),
    };

    match format {
        OutputFormat::Table => println!("{}", format_table(&configurations, &instances)),
        OutputFormat::Json => {
            let output: Vec<ConfigurationOutput> = configurations
                .iter()
                .map(|c| ConfigurationOutput::new(c, &instances))
                .collect();
            let json = serde_json::to_string_pretty(&output)
                .map_err(|e| CliError::Config(format!("Failed to serialize to JSON: {e}")))?;
            println!("{json}");
        }
    }
    Ok(())
}

fn instance_name(instances: &[VpsInstance], config: &ClientConfiguration) -> String {
    instances
        .iter()
        .find(|i| i.id == config.vps_id)
        .map_or_else(|| "(removed)".to_string(), |i| i.name.clone())
}

/// Format configurations as a table string
#[must_use]
pub fn format_table(configurations: &[&ClientConfiguration], instances: &[VpsInstance]) -> String {
    if configurations.is_empty() {
        return "No client configurations found.".to_string();
    }

    let mut output = String::new();
    let tag_width = configurations
        .iter()
        .map(|c| c.tag().len())
        .max()
        .unwrap_or(3)
        .max(3);

    let _ = writeln!(
        output,
        "{:<8}  {:<tag_width$}  {:<11}  INSTANCE",
        "ID", "TAG", "PROTOCOL"
    );
    let _ = writeln!(output, "{:-<8}  {:-<tag_width$}  {:-<11}  {:-<8}", "", "", "", "");
    for config in configurations {
        let id = config.id.to_string();
        let _ = writeln!(
            output,
            "{:<8}  {:<tag_width$}  {:<11}  {}",
            &id[..8],
            config.tag(),
            protocol_label(config.protocol_type),
            instance_name(instances, config)
        );
    }

    output.trim_end().to_string()
}

/// Configuration output for CLI listings; secrets are never included
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConfigurationOutput {
    pub id: String,
    pub tag: String,
    pub protocol: String,
    pub protocol_label: String,
    pub server: String,
    pub port: u16,
    pub vps_id: String,
    pub instance: String,
}

impl ConfigurationOutput {
    fn new(config: &ClientConfiguration, instances: &[VpsInstance]) -> Self {
        Self {
            id: config.id.to_string(),
            tag: config.tag(),
            protocol: config.protocol_type.as_str().to_string(),
            protocol_label: protocol_label(config.protocol_type).to_string(),
            server: config.server_address.clone(),
            port: config.port,
            vps_id: config.vps_id.to_string(),
            instance: instance_name(instances, config),
        }
    }
}

/// Lists every format with its extension and the apps consuming it
#[must_use]
pub fn format_targets() -> String {
    let mut output = String::new();
    for format in ClientConfigFormat::all() {
        let _ = writeln!(
            output,
            "{} ({}, .{})",
            format_label(*format),
            format.as_str(),
            format.extension()
        );
        for app in ClientAppType::all().iter().filter(|a| a.format() == *format) {
            let marker = if *app == format.default_app() { " (default)" } else { "" };
            let _ = writeln!(output, "  {:<18} {}{marker}", app.as_str(), app_label(*app));
        }
    }
    output.trim_end().to_string()
}

/// Parses a JSON object or array of configurations
pub fn parse_import(content: &str) -> Result<Vec<ClientConfiguration>, CliError> {
    let value: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| CliError::Import(format!("Invalid JSON: {e}")))?;
    let parsed = if value.is_array() {
        serde_json::from_value::<Vec<ClientConfiguration>>(value)
    } else {
        serde_json::from_value::<ClientConfiguration>(value).map(|config| vec![config])
    };
    parsed.map_err(|e| CliError::Import(format!("Invalid client configuration: {e}")))
}

fn cmd_import(workspace: &mut Workspace, file: &Path) -> Result<(), CliError> {
    let content = std::fs::read_to_string(file)
        .map_err(|e| CliError::Import(format!("Failed to read {}: {e}", file.display())))?;
    let configurations = parse_import(&content)?;
    let instances = workspace.instances();

    let mut imported = 0;
    for config in configurations {
        let tag = config.tag();
        let orphan = !instances.iter().any(|i| i.id == config.vps_id);
        workspace.compiler.register(config)?;
        imported += 1;
        if orphan {
            println!("Note: '{tag}' references an instance that is not in the fleet");
        }
    }
    workspace.save()?;

    println!("Imported {imported} configuration(s)");
    Ok(())
}

fn cmd_import_uri(workspace: &mut Workspace, vps: &str, uri: &str) -> Result<(), CliError> {
    let instances = workspace.instances();
    let instance = find_instance(&instances, vps)?;

    let config = ConfigurationCompiler::parse_protocol_url(uri, instance.id)?;
    let tag = config.tag();
    let id = workspace.compiler.register(config)?;
    workspace.save()?;

    println!("Imported '{tag}' ({id}) for '{}'", instance.name);
    Ok(())
}

fn cmd_export(
    workspace: &Workspace,
    target: &str,
    format: ClientConfigFormat,
    app: Option<ClientAppType>,
    output: Option<PathBuf>,
) -> Result<(), CliError> {
    let id = resolve(workspace, target)?;

    let location = if let Some(dir) = output {
        let mut compiler = ConfigurationCompiler::new(Arc::new(FileExportSink::new(dir)));
        compiler.restore(workspace.compiler.snapshot());
        workspace.block_on(compiler.export_config(id, format, app))?
    } else {
        workspace.block_on(workspace.compiler.export_config(id, format, app))?
    };

    let app = app.unwrap_or_else(|| format.default_app());
    println!(
        "Exported {} for {} to {location}",
        format_label(format),
        app_label(app)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;
    use vpstools_core::ProtocolType;

    use super::*;

    #[test]
    fn test_parse_import_object_and_array() {
        let single = r#"{
            "vps_id": "00000000-0000-0000-0000-000000000000",
            "protocol_type": "shadowsocks",
            "server_address": "1.2.3.4",
            "port": 8388,
            "method": "aes-256-gcm",
            "password": "secret"
        }"#;
        let parsed = parse_import(single).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].protocol_type, ProtocolType::Shadowsocks);
        assert_ne!(parsed[0].id, Uuid::nil());

        let array = format!("[{single}, {single}]");
        let parsed = parse_import(&array).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_ne!(parsed[0].id, parsed[1].id);
    }

    #[test]
    fn test_parse_import_rejects_garbage() {
        assert!(matches!(parse_import("not json"), Err(CliError::Import(_))));
        assert!(matches!(parse_import("{\"port\": 1}"), Err(CliError::Import(_))));
    }

    #[test]
    fn test_format_table_marks_removed_instances() {
        let config = ClientConfiguration::new(Uuid::new_v4(), ProtocolType::Trojan, "1.2.3.4", 443);
        let table = format_table(&[&config], &[]);
        assert!(table.contains("(removed)"));
        assert!(table.contains("Trojan"));
    }

    #[test]
    fn test_format_targets_lists_every_app_under_its_format() {
        let listing = format_targets();
        assert!(listing.contains("sing-box JSON (sing-box, .json)"));
        assert!(listing.contains("Clash YAML (clash, .yaml)"));
        assert!(listing.contains("URI bundle (uri, .txt)"));
        for app in ClientAppType::all() {
            assert!(listing.contains(app_label(*app)), "missing {}", app.as_str());
        }
        assert!(listing.contains("Clash Verge (default)"));
    }
}
