use crate::config::Config;
use crate::error::{Result, SyscimError, ValidationError};
use crate::syslog::DeviceZone;
use std::collections::HashSet;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every problem before failing
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_device(config, &mut errors);
        Self::validate_taxonomy(config, &mut errors);
        Self::validate_required_fields(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SyscimError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_device(config: &Config, errors: &mut Vec<ValidationError>) {
        if let Some(zone) = &config.device.time_zone {
            if let Err(e) = zone.parse::<DeviceZone>() {
                errors.push(ValidationError::new("device.time_zone", e.to_string()));
            }
        }
    }

    fn validate_taxonomy(config: &Config, errors: &mut Vec<ValidationError>) {
        // Existence is not checked: a missing file falls back to the bundled taxonomy
        if config.taxonomy.path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "taxonomy.path",
                "Taxonomy path cannot be empty",
            ));
        }
    }

    fn validate_required_fields(config: &Config, errors: &mut Vec<ValidationError>) {
        let mut seen = HashSet::new();
        for field in &config.validation.required {
            if field.trim().is_empty() {
                errors.push(ValidationError::new(
                    "validation.required",
                    "Required field names cannot be empty",
                ));
            } else if !seen.insert(field.as_str()) {
                errors.push(ValidationError::new(
                    "validation.required",
                    format!("Duplicate required field: {}", field),
                ));
            }
        }
    }
}
