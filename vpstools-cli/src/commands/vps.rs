//! VPS instance commands.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, TimeDelta, Utc};
use vpstools_core::{
    ConnectionTestResult, Credential, ProbeSummary, SystemInfo, VpsDraft, VpsInstance, VpsPatch,
    service_status_label, service_type_label,
};

use crate::cli::{OutputFormat, VpsCommands};
use crate::error::CliError;
use crate::util::{Workspace, find_instance};

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// VPS command handler
pub fn cmd_vps(config_path: Option<&Path>, subcmd: VpsCommands) -> Result<(), CliError> {
    let workspace = Workspace::open(config_path)?;

    match subcmd {
        VpsCommands::List { format, group } => cmd_list(&workspace, format, group.as_deref()),
        VpsCommands::Add {
            name,
            host,
            port,
            user,
            password,
            key,
            group,
            tags,
        } => {
            let password = match (password, &key) {
                (None, None) => Some(prompt_password(&host)?),
                (password, _) => password,
            };
            let draft = VpsDraft {
                name: name.unwrap_or_default(),
                host,
                port: Some(port),
                username: user,
                auth_method: None,
                password,
                key_path: key,
                group,
                tags,
            };
            cmd_add(&workspace, draft)
        }
        VpsCommands::Show { name } => cmd_show(&workspace, &name),
        VpsCommands::Edit {
            name,
            new_name,
            host,
            port,
            user,
            password,
            key,
            group,
            tags,
        } => {
            let credential = match (password, key) {
                (Some(password), _) => Some(Credential::Password { password }),
                (None, Some(key_path)) => Some(Credential::Key {
                    key_path,
                    passphrase: None,
                }),
                (None, None) => None,
            };
            let patch = VpsPatch {
                name: new_name,
                host,
                port,
                username: user,
                credential,
                group,
                tags: tags.map(|t| t.into_iter().collect::<BTreeSet<_>>()),
            };
            cmd_edit(&workspace, &name, &patch)
        }
        VpsCommands::Delete { name } => cmd_delete(&workspace, &name),
        VpsCommands::Test { name } => cmd_test(&workspace, &name),
        VpsCommands::Info { name } => cmd_info(&workspace, &name),
    }
}

fn prompt_password(host: &str) -> Result<String, CliError> {
    eprint!("Enter SSH password for '{host}': ");
    rpassword::read_password()
        .map_err(|e| CliError::Validation(format!("Failed to read password: {e}")))
}

fn cmd_list(
    workspace: &Workspace,
    format: OutputFormat,
    group: Option<&str>,
) -> Result<(), CliError> {
    let instances: Vec<VpsInstance> = workspace
        .instances()
        .into_iter()
        .filter(|i| group.is_none_or(|g| i.group.eq_ignore_ascii_case(g)))
        .collect();

    match format {
        OutputFormat::Table => println!("{}", format_table(&instances)),
        OutputFormat::Json => {
            let output: Vec<InstanceOutput> = instances.iter().map(Into::into).collect();
            let json = serde_json::to_string_pretty(&output)
                .map_err(|e| CliError::Config(format!("Failed to serialize to JSON: {e}")))?;
            println!("{json}");
        }
    }
    Ok(())
}

/// Format instances as a table string
#[must_use]
pub fn format_table(instances: &[VpsInstance]) -> String {
    if instances.is_empty() {
        return "No instances found.".to_string();
    }

    let mut output = String::new();

    let group_width = instances.iter().map(|i| i.group.len()).max().unwrap_or(5).max(5);
    let name_width = instances.iter().map(|i| i.name.len()).max().unwrap_or(4).max(4);
    let address_width = instances
        .iter()
        .map(|i| i.address().len())
        .max()
        .unwrap_or(7)
        .max(7);
    let user_width = instances.iter().map(|i| i.username.len()).max().unwrap_or(4).max(4);

    let _ = writeln!(
        output,
        "{:<group_width$}  {:<name_width$}  {:<address_width$}  {:<user_width$}  {:<8}  LAST CONNECTED",
        "GROUP", "NAME", "ADDRESS", "USER", "AUTH"
    );
    let _ = writeln!(
        output,
        "{:-<group_width$}  {:-<name_width$}  {:-<address_width$}  {:-<user_width$}  {:-<8}  {:-<16}",
        "", "", "", "", "", ""
    );

    let now = Utc::now();
    for instance in instances {
        let last = instance
            .last_connected
            .map_or_else(|| "never".to_string(), |t| format_since(t, now));
        let _ = writeln!(
            output,
            "{:<group_width$}  {:<name_width$}  {:<address_width$}  {:<user_width$}  {:<8}  {last}",
            instance.group,
            instance.name,
            instance.address(),
            instance.username,
            instance.auth_method(),
        );
    }

    output.trim_end().to_string()
}

/// Formats the time since `then` as `5m ago`, `3h ago` or `2d ago`
#[must_use]
pub fn format_since(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(then);
    if elapsed < TimeDelta::minutes(1) {
        "just now".to_string()
    } else if elapsed < TimeDelta::hours(1) {
        format!("{}m ago", elapsed.num_minutes())
    } else if elapsed < TimeDelta::days(1) {
        format!("{}h ago", elapsed.num_hours())
    } else {
        format!("{}d ago", elapsed.num_days())
    }
}

/// Instance output for CLI listings; credentials are never included
#[derive(Debug, Clone, serde::Serialize)]
pub struct InstanceOutput {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth_method: String,
    pub group: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_connected: Option<String>,
    pub services: usize,
}

impl From<&VpsInstance> for InstanceOutput {
    fn from(instance: &VpsInstance) -> Self {
        Self {
            id: instance.id.to_string(),
            name: instance.name.clone(),
            host: instance.host.clone(),
            port: instance.port,
            username: instance.username.clone(),
            auth_method: instance.auth_method().to_string(),
            group: instance.group.clone(),
            tags: instance.tags.iter().cloned().collect(),
            last_connected: instance.last_connected.map(|t| t.to_rfc3339()),
            services: instance.services.len(),
        }
    }
}

fn cmd_add(workspace: &Workspace, draft: VpsDraft) -> Result<(), CliError> {
    println!("Testing {}:{}...", draft.host, draft.port.unwrap_or_default());
    let instance = workspace.block_on(workspace.fleet.add_instance(draft))?;
    workspace.save()?;

    println!(
        "{GREEN}{BOLD}✓{RESET} Added instance '{}' ({})",
        instance.name, instance.id
    );
    Ok(())
}

fn cmd_show(workspace: &Workspace, name: &str) -> Result<(), CliError> {
    let instances = workspace.instances();
    let instance = find_instance(&instances, name)?;

    println!("Instance Details:");
    println!("  ID:       {}", instance.id);
    println!("  Name:     {}", instance.name);
    println!("  Host:     {}", instance.host);
    println!("  Port:     {}", instance.port);
    println!("  User:     {}", instance.username);
    println!("  Auth:     {}", instance.auth_method());
    if let Credential::Key { key_path, .. } = &instance.credential {
        println!("  Key Path: {key_path}");
    }
    println!("  Group:    {}", instance.group);
    if !instance.tags.is_empty() {
        let tags: Vec<&str> = instance.tags.iter().map(String::as_str).collect();
        println!("  Tags:     {}", tags.join(", "));
    }
    match instance.last_connected {
        Some(t) => println!("  Last connected: {}", t.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("  Last connected: never"),
    }

    if !instance.services.is_empty() {
        println!("\nServices:");
        for service in &instance.services {
            let port = service.port.map_or_else(String::new, |p| format!(":{p}"));
            println!(
                "  {} [{}{port}] {} - {}",
                service.display_name,
                service_type_label(service.service_type),
                service.id,
                service_status_label(service.status)
            );
        }
    }

    if let Some(info) = &instance.system_info {
        println!();
        print_system_info(info);
    }

    let configs = workspace.compiler.list_for_vps(instance.id);
    if !configs.is_empty() {
        println!("\nClient configurations: {}", configs.len());
    }
    Ok(())
}

fn cmd_edit(workspace: &Workspace, name: &str, patch: &VpsPatch) -> Result<(), CliError> {
    if patch.is_empty() {
        return Err(CliError::Validation("No changes specified".to_string()));
    }

    let instances = workspace.instances();
    let instance = find_instance(&instances, name)?;
    let updated = workspace.block_on(workspace.fleet.edit_instance(instance.id, patch))?;
    workspace.save()?;

    println!("Updated instance '{}' ({})", updated.name, updated.id);
    Ok(())
}

fn cmd_delete(workspace: &Workspace, name: &str) -> Result<(), CliError> {
    let instances = workspace.instances();
    let instance = find_instance(&instances, name)?;

    if !workspace.block_on(workspace.fleet.delete_instance(instance.id)) {
        return Err(CliError::InstanceNotFound(name.to_string()));
    }
    workspace.save()?;

    println!("Deleted instance '{}' ({})", instance.name, instance.id);
    let remaining = workspace.compiler.list_for_vps(instance.id).len();
    if remaining > 0 {
        println!("Note: {remaining} client configuration(s) still reference this instance");
    }
    Ok(())
}

fn cmd_test(workspace: &Workspace, name: &str) -> Result<(), CliError> {
    let instances = workspace.instances();

    if name.eq_ignore_ascii_case("all") {
        if instances.is_empty() {
            println!("No instances configured.");
            return Ok(());
        }

        println!("Testing {} instances...\n", instances.len());
        let summary = workspace.block_on(workspace.fleet.test_all_connections());
        workspace.save()?;

        for outcome in &summary.results {
            print_test_result(&outcome.name, &outcome.result);
        }
        println!();
        print_test_summary(&summary);

        if !summary.all_passed() {
            return Err(CliError::TestFailed(format!(
                "{} of {} tests failed",
                summary.failed, summary.total
            )));
        }
        return Ok(());
    }

    let instance = find_instance(&instances, name)?;
    println!("Testing instance '{}'...\n", instance.name);

    let result = workspace.block_on(workspace.fleet.test_connection(instance.id))?;
    workspace.save()?;
    print_test_result(&instance.name, &result);

    match result.failure_reason() {
        Some(reason) => Err(CliError::TestFailed(reason.to_string())),
        None => Ok(()),
    }
}

fn cmd_info(workspace: &Workspace, name: &str) -> Result<(), CliError> {
    let instances = workspace.instances();
    let instance = find_instance(&instances, name)?;

    // Telemetry needs a successful session in this process
    let result = workspace.block_on(workspace.fleet.test_connection(instance.id))?;
    if let Some(reason) = result.failure_reason() {
        return Err(CliError::TestFailed(reason.to_string()));
    }

    let info = workspace.block_on(workspace.fleet.get_system_info(instance.id))?;
    workspace.save()?;

    println!("{BOLD}{}{RESET} ({})", instance.name, instance.address());
    print_system_info(&info);
    Ok(())
}

fn print_system_info(info: &SystemInfo) {
    println!("System:");
    println!("  OS:       {}", info.os_name);
    println!("  Kernel:   {}", info.kernel_version);
    println!("  CPU:      {} ({} cores)", info.cpu_model, info.cpu_cores);
    println!("  Memory:   {:.1}%", info.memory_usage);
    println!("  Disk:     {:.1}%", info.disk_usage);
    println!(
        "  Load:     {:.2} {:.2} {:.2}",
        info.load_average[0], info.load_average[1], info.load_average[2]
    );
    println!("  Uptime:   {}", format_uptime(info.uptime_secs));
}

/// Formats seconds as `1d 2h 3m`
#[must_use]
pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

fn print_test_result(name: &str, result: &ConnectionTestResult) {
    if result.is_success() {
        println!("{GREEN}{BOLD}✓{RESET} {name}");
        return;
    }

    print!("{RED}{BOLD}✗{RESET} {name}");
    if let Some(reason) = result.failure_reason() {
        print!(" {YELLOW}- {reason}{RESET}");
    }
    println!();
    println!("    reachable: {}", if result.ping_success { "yes" } else { "no" });
}

fn print_test_summary(summary: &ProbeSummary) {
    println!("{BOLD}Test Summary:{RESET}");
    println!("  Total:  {}", summary.total);

    if summary.passed > 0 {
        println!("  {GREEN}Passed: {}{RESET}", summary.passed);
    } else {
        println!("  Passed: {}", summary.passed);
    }

    if summary.failed > 0 {
        println!("  {RED}Failed: {}{RESET}", summary.failed);
    } else {
        println!("  Failed: {}", summary.failed);
    }

    let pass_rate = summary.pass_rate();
    if pass_rate >= 100.0 {
        println!("  {GREEN}Pass rate: {pass_rate:.1}%{RESET}");
    } else if pass_rate >= 50.0 {
        println!("  Pass rate: {pass_rate:.1}%");
    } else {
        println!("  {RED}Pass rate: {pass_rate:.1}%{RESET}");
    }
}
