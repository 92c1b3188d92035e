//! 配置校验模块
//!
//! 校验规则：
//! - 字段范围 (num_workers 1..=64, interval_ms > 0, sink.name 非空)
//! - file sink 必须提供 `path`
//! - http sink 必须提供 `server.base_url`
//! - `server.version` 可解析为 `major.minor.patch`

use contracts::{ContractError, PipelineConfig, ServerVersion, SinkType};
use validator::{Validate, ValidationErrors};

/// 校验 PipelineConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &PipelineConfig) -> Result<(), ContractError> {
    validate_ranges(config)?;
    validate_sink(config)?;
    validate_server(config)?;
    Ok(())
}

/// 字段范围校验 (derive 规则)
fn validate_ranges(config: &PipelineConfig) -> Result<(), ContractError> {
    config.validate().map_err(|errors| first_error(&errors))
}

/// 将 validator 的嵌套错误展开为第一个 `field` + `message`
fn first_error(errors: &ValidationErrors) -> ContractError {
    fn walk(prefix: &str, errors: &ValidationErrors) -> Option<(String, String)> {
        use validator::ValidationErrorsKind;

        for (field, kind) in errors.errors() {
            let path = if prefix.is_empty() {
                field.to_string()
            } else {
                format!("{prefix}.{field}")
            };
            match kind {
                ValidationErrorsKind::Field(list) => {
                    if let Some(err) = list.first() {
                        let message = err
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("failed '{}' check", err.code));
                        return Some((path, message));
                    }
                }
                ValidationErrorsKind::Struct(inner) => {
                    if let Some(found) = walk(&path, inner) {
                        return Some(found);
                    }
                }
                ValidationErrorsKind::List(items) => {
                    for (idx, inner) in items {
                        if let Some(found) = walk(&format!("{path}[{idx}]"), inner) {
                            return Some(found);
                        }
                    }
                }
            }
        }
        None
    }

    let (field, message) =
        walk("", errors).unwrap_or_else(|| ("config".to_string(), errors.to_string()));
    ContractError::config_validation(field, message)
}

/// 校验 sink 必填参数
fn validate_sink(config: &PipelineConfig) -> Result<(), ContractError> {
    let sink = &config.sink;
    match sink.sink_type {
        SinkType::Log => {}
        SinkType::File => {
            if sink.params.get("path").is_none_or(|p| p.trim().is_empty()) {
                return Err(ContractError::config_validation(
                    "sink.params.path",
                    "file sink requires a 'path' parameter",
                ));
            }
        }
        SinkType::Http => {
            if config
                .server
                .base_url
                .as_deref()
                .is_none_or(|u| u.trim().is_empty())
            {
                return Err(ContractError::config_validation(
                    "server.base_url",
                    "http sink requires server.base_url",
                ));
            }
            if let Some(raw) = sink.params.get("timeout_ms") {
                if raw.parse::<u64>().is_err() {
                    return Err(ContractError::config_validation(
                        "sink.params.timeout_ms",
                        format!("timeout_ms must be an integer, got '{raw}'"),
                    ));
                }
            }
        }
    }
    Ok(())
}

/// 校验服务器版本格式
fn validate_server(config: &PipelineConfig) -> Result<(), ContractError> {
    if let Some(ref version) = config.server.version {
        version.parse::<ServerVersion>().map_err(|e| {
            ContractError::config_validation("server.version", e.to_string())
        })?;
    }
    Ok(())
}
