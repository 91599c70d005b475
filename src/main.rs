use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;

use flow::{ConfigRepository, Event, Trigger};
use log::info;
use uuid::Uuid;
use wf_domain::{Schedule, Secret, Workflow, WorkflowId, WorkflowInstance, WorkflowState};
use wf_persistence::{new_aggregate_from_env, MirrorPolicy};
use wf_scheduler::{standard_manager, SchedulerConfig};

/// Menú interactivo de operación del orquestador.
///
/// Opciones soportadas:
/// 1) Listar instancias activas
/// 2) Ver eventos de una instancia
/// 3) Disparar (trigger adhoc) una instancia
/// 4) Detener (halt) una instancia
/// 5) Habilitar / deshabilitar un workflow
/// 6) Kill switch global
/// 7) Registrar un workflow
/// 8) Historial de ejecuciones de un workflow
/// 9) Salir
fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let config = SchedulerConfig::from_env()?;
    let policy = MirrorPolicy { queue_capacity: config.mirror_queue_capacity, ..MirrorPolicy::default() };
    // Aplica migraciones embebidas en ambas bases
    let storage = Arc::new(new_aggregate_from_env(policy)?);
    let manager = standard_manager(storage.clone(), &config);
    let restored = manager.restore()?;
    info!("wf-cli listo, {} instancias restauradas", restored);

    loop {
        println!("\n== Workflow CLI ==");
        println!("1) Listar instancias activas");
        println!("2) Ver eventos de una instancia");
        println!("3) Disparar instancia (adhoc)");
        println!("4) Detener instancia (halt)");
        println!("5) Habilitar / deshabilitar workflow");
        println!("6) Kill switch global");
        println!("7) Registrar workflow");
        println!("8) Historial de un workflow");
        println!("9) Salir");
        print!("Elige una opción: ");
        io::stdout().flush().ok();

        let mut choice = String::new();
        if io::stdin().read_line(&mut choice)? == 0 {
            break;
        }
        match choice.trim() {
            "1" => match manager.list_active() {
                Ok(active) => {
                    let mut rows: Vec<_> = active.into_iter().collect();
                    rows.sort();
                    println!("\n{:<60} | COUNTER", "INSTANCIA");
                    println!("{}", "-".repeat(72));
                    for (instance, counter) in rows {
                        println!("{:<60} | {}", instance.to_key(), counter);
                    }
                }
                Err(e) => eprintln!("Error listando activas: {}", e),
            },
            "2" => {
                let instance = match prompt_instance()? {
                    Some(i) => i,
                    None => continue,
                };
                match manager.history(&instance) {
                    Ok(events) if events.is_empty() => println!("Sin eventos para {}", instance),
                    Ok(events) => {
                        for e in events {
                            println!("{:>4} {} {:<18} {}",
                                     e.counter,
                                     e.timestamp.format("%Y-%m-%d %H:%M:%S"),
                                     e.event.kind.name(),
                                     serde_json::to_string(&e.event.kind)?);
                        }
                    }
                    Err(e) => eprintln!("Error leyendo eventos: {}", e),
                }
            }
            "3" => {
                let instance = match prompt_instance()? {
                    Some(i) => i,
                    None => continue,
                };
                let id = format!("adhoc-{}", Uuid::new_v4());
                match manager.trigger(instance.clone(), Trigger::Adhoc { id: id.clone() }) {
                    Ok(()) => println!("Trigger {} aplicado a {}", id, instance),
                    Err(e) => eprintln!("Trigger rechazado: {}", e),
                }
            }
            "4" => {
                let instance = match prompt_instance()? {
                    Some(i) => i,
                    None => continue,
                };
                let reason = prompt("Motivo (enter para vacío): ")?;
                let reason = if reason.trim().is_empty() { None } else { Some(reason.trim().to_string()) };
                match manager.receive(Event::halt(instance.clone(), reason)) {
                    Ok(()) => println!("{} detenida", instance),
                    Err(e) => eprintln!("Error deteniendo instancia: {}", e),
                }
            }
            "5" => {
                let component = prompt("Component id: ")?;
                let endpoint = prompt("Endpoint id (enter para todo el componente): ")?;
                let enable = prompt("Habilitar? (s/n): ")?.trim().eq_ignore_ascii_case("s");
                let delta = WorkflowState::default().with_enabled(enable);
                let result = if endpoint.trim().is_empty() {
                    storage.patch_component_state(component.trim(), &delta)
                } else {
                    match WorkflowId::new(component.trim(), endpoint.trim()) {
                        Ok(id) => storage.patch_state(&id, &delta),
                        Err(e) => {
                            eprintln!("Id inválido: {}", e);
                            continue;
                        }
                    }
                };
                match result {
                    Ok(()) => println!("enabled = {}", enable),
                    Err(e) => eprintln!("Error actualizando estado: {}", e),
                }
            }
            "6" => {
                let current = match storage.global_enabled() {
                    Ok(current) => current,
                    Err(e) => {
                        eprintln!("Error leyendo el switch global: {}", e);
                        continue;
                    }
                };
                println!("Triggers globales: {}", if current { "habilitados" } else { "deshabilitados" });
                let answer = prompt("Nuevo valor (on/off, enter para dejarlo): ")?;
                let target = match answer.trim() {
                    "on" => true,
                    "off" => false,
                    _ => continue,
                };
                match storage.set_global_enabled(target) {
                    Ok(previous) => println!("Kill switch: {} -> {}", previous, target),
                    Err(e) => eprintln!("Error cambiando switch global: {}", e),
                }
            }
            "7" => {
                let component = prompt("Component id: ")?;
                let endpoint = prompt("Endpoint id: ")?;
                let id = match WorkflowId::new(component.trim(), endpoint.trim()) {
                    Ok(id) => id,
                    Err(e) => {
                        eprintln!("Id inválido: {}", e);
                        continue;
                    }
                };
                let image = prompt("Docker image (enter para ninguna): ")?;
                let args = prompt("Docker args como JSON (ej: [\"echo\",\"hola\"], enter para ninguno): ")?;
                let docker_args = if args.trim().is_empty() {
                    None
                } else {
                    match serde_json::from_str::<Vec<String>>(args.trim()) {
                        Ok(a) => Some(a),
                        Err(e) => {
                            eprintln!("Args inválidos: {}", e);
                            continue;
                        }
                    }
                };
                let secret_name = prompt("Secret (nombre, enter para ninguno): ")?;
                let secret = if secret_name.trim().is_empty() {
                    None
                } else {
                    let mount = prompt("Mount path del secret: ")?;
                    Some(Secret { name: secret_name.trim().to_string(), mount_path: mount.trim().to_string() })
                };
                let schedule = Schedule { docker_image: non_empty(&image), docker_args, secret };
                match storage.store_workflow(&Workflow::new(id.clone(), schedule)) {
                    Ok(()) => println!("Workflow {} registrado", id),
                    Err(e) => eprintln!("Error registrando workflow: {}", e),
                }
            }
            "8" => {
                let component = prompt("Component id: ")?;
                let endpoint = prompt("Endpoint id: ")?;
                let id = match WorkflowId::new(component.trim(), endpoint.trim()) {
                    Ok(id) => id,
                    Err(e) => {
                        eprintln!("Id inválido: {}", e);
                        continue;
                    }
                };
                match manager.execution_history(&id) {
                    Ok(history) => {
                        for (instance, events) in history {
                            let last = events.last().map(|e| e.event.kind.name()).unwrap_or("-");
                            println!("{:<30} eventos={:<4} último={}", instance.parameter(), events.len(), last);
                        }
                    }
                    Err(e) => eprintln!("Error leyendo historial: {}", e),
                }
            }
            "9" => {
                println!("Saliendo...");
                break;
            }
            other => {
                println!("Opción inválida: {}", other);
            }
        }
    }

    manager.close();
    storage.shutdown();
    Ok(())
}

fn prompt(msg: &str) -> io::Result<String> {
    print!("{}", msg);
    io::stdout().flush()?;
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    Ok(s)
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// Pide component, endpoint y parameter. `None` si alguno es inválido.
fn prompt_instance() -> Result<Option<WorkflowInstance>, Box<dyn Error>> {
    let component = prompt("Component id: ")?;
    let endpoint = prompt("Endpoint id: ")?;
    let parameter = prompt("Parameter (ej: 2016-09-14T10): ")?;
    let instance = WorkflowId::new(component.trim(), endpoint.trim()).and_then(|id| {
                                                                          WorkflowInstance::new(id, parameter.trim())
                                                                      });
    match instance {
        Ok(i) => Ok(Some(i)),
        Err(e) => {
            eprintln!("Instancia inválida: {}", e);
            Ok(None)
        }
    }
}
