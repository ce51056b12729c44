//! Deployed service commands.

use std::path::Path;

use vpstools_core::{VpsService, service_status_label, service_type_label};

use crate::cli::ServiceCommands;
use crate::error::CliError;
use crate::util::{Workspace, find_instance};

/// Service command handler
pub fn cmd_service(config_path: Option<&Path>, subcmd: ServiceCommands) -> Result<(), CliError> {
    let workspace = Workspace::open(config_path)?;
    let instances = workspace.instances();

    match subcmd {
        ServiceCommands::Add {
            vps,
            id,
            service_type,
            name,
            port,
            status,
        } => {
            let instance = find_instance(&instances, &vps)?;
            let display_name = name.unwrap_or_else(|| id.clone());
            let mut service = VpsService::new(id, service_type, display_name).with_status(status);
            if let Some(port) = port {
                service = service.with_port(port);
            }
            let service_id = service.id.clone();

            workspace.block_on(workspace.fleet.add_service(instance.id, service))?;
            workspace.save()?;
            println!("Added service '{service_id}' to '{}'", instance.name);
            Ok(())
        }
        ServiceCommands::List { vps } => {
            let instance = find_instance(&instances, &vps)?;
            if instance.services.is_empty() {
                println!("No services registered on '{}'.", instance.name);
                return Ok(());
            }

            let id_width = instance.services.iter().map(|s| s.id.len()).max().unwrap_or(2).max(2);
            println!("{:<id_width$}  {:<12}  {:<6}  {:<8}  NAME", "ID", "TYPE", "PORT", "STATUS");
            for service in &instance.services {
                let port = service.port.map_or_else(|| "-".to_string(), |p| p.to_string());
                println!(
                    "{:<id_width$}  {:<12}  {:<6}  {:<8}  {}",
                    service.id,
                    service_type_label(service.service_type),
                    port,
                    service_status_label(service.status),
                    service.display_name
                );
            }
            Ok(())
        }
    }
}
