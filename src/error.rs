use thiserror::Error;

/// Conditions that stop the viewer before the frame loop starts.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("window is unavailable: {0}")]
    WindowUnavailable(String),
    #[error("no compatible GPU adapter: {0}")]
    NoAdapter(String),
    #[error("shadow map target {width}x{height} is incomplete: {reason}")]
    ShadowTargetIncomplete {
        width: u32,
        height: u32,
        reason: String,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_target_message_names_the_size() {
        let err = StartupError::ShadowTargetIncomplete {
            width: 0,
            height: 0,
            reason: "zero-sized".into(),
        };
        assert_eq!(
            err.to_string(),
            "shadow map target 0x0 is incomplete: zero-sized"
        );
    }
}
