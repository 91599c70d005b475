// Archivo: config.rs
// Propósito: configuración del scheduler desde variables de entorno.
use crate::errors::SchedulerError;
use crate::handlers::RetryPolicy;
use std::str::FromStr;

/// Parámetros de ejecución del scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
  pub retry: RetryPolicy,
  /// Capacidad de la cola del mirror del store secundario.
  pub mirror_queue_capacity: usize,
}

impl Default for SchedulerConfig {
  fn default() -> Self {
    Self { retry: RetryPolicy::default(), mirror_queue_capacity: 1024 }
  }
}

impl SchedulerConfig {
  /// Lee `WF_MAX_TRIES`, `WF_RETRY_BASE_DELAY_MS`, `WF_RETRY_MAX_DELAY_MS` y
  /// `WF_MIRROR_QUEUE` (cargando `.env` si existe). Variables ausentes toman
  /// el valor por defecto; valores no numéricos son error.
  pub fn from_env() -> Result<Self, SchedulerError> {
    dotenvy::dotenv().ok();
    Self::from_lookup(|name| std::env::var(name).ok())
  }

  /// Igual que `from_env` pero con una fuente de variables arbitraria.
  pub fn from_lookup<F>(lookup: F) -> Result<Self, SchedulerError>
    where F: Fn(&str) -> Option<String>
  {
    let defaults = Self::default();
    let retry = RetryPolicy { max_tries: parse_or(&lookup, "WF_MAX_TRIES", defaults.retry.max_tries)?,
                              base_delay_ms: parse_or(&lookup, "WF_RETRY_BASE_DELAY_MS", defaults.retry.base_delay_ms)?,
                              max_delay_ms: parse_or(&lookup, "WF_RETRY_MAX_DELAY_MS", defaults.retry.max_delay_ms)? };
    if retry.max_tries == 0 {
      return Err(SchedulerError::Config("WF_MAX_TRIES debe ser mayor que 0".into()));
    }
    if retry.max_delay_ms < retry.base_delay_ms {
      return Err(SchedulerError::Config("WF_RETRY_MAX_DELAY_MS menor que WF_RETRY_BASE_DELAY_MS".into()));
    }
    let mirror_queue_capacity = parse_or(&lookup, "WF_MIRROR_QUEUE", defaults.mirror_queue_capacity)?;
    Ok(Self { retry, mirror_queue_capacity })
  }
}

fn parse_or<T, F>(lookup: &F, name: &str, default: T) -> Result<T, SchedulerError>
  where T: FromStr,
        F: Fn(&str) -> Option<String>
{
  match lookup(name) {
    Some(raw) => raw.trim()
                    .parse::<T>()
                    .map_err(|_| SchedulerError::Config(format!("{}='{}' no es un número válido", name, raw))),
    None => Ok(default),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |name| map.get(name).cloned()
  }

  #[test]
  fn defaults_when_unset() {
    let cfg = SchedulerConfig::from_lookup(lookup(&[])).unwrap();
    assert_eq!(cfg, SchedulerConfig::default());
    assert_eq!(cfg.retry.max_tries, 3);
    assert_eq!(cfg.retry.base_delay_ms, 60_000);
  }

  #[test]
  fn overrides_and_errors() {
    let cfg = SchedulerConfig::from_lookup(lookup(&[("WF_MAX_TRIES", "5"), ("WF_MIRROR_QUEUE", "16")])).unwrap();
    assert_eq!(cfg.retry.max_tries, 5);
    assert_eq!(cfg.mirror_queue_capacity, 16);

    let err = SchedulerConfig::from_lookup(lookup(&[("WF_RETRY_BASE_DELAY_MS", "soon")])).unwrap_err();
    assert!(matches!(err, SchedulerError::Config(_)));
    let err = SchedulerConfig::from_lookup(lookup(&[("WF_MAX_TRIES", "0")])).unwrap_err();
    assert!(matches!(err, SchedulerError::Config(_)));
  }
}
