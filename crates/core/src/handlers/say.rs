use super::{CommandError, CommandHandler, HandlerOutcome, SkipReason};
use crate::actuator::ActuatorAccessor;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

/// Renders arguments as text and joins them with single spaces.
///
/// Strings are used verbatim, `null` entries are dropped, and any other value
/// is written in its compact JSON form (`42`, `true`, `[1,2]`).
pub fn join_args(args: &[Value]) -> String {
    args.iter()
        .filter_map(|arg| match arg {
            Value::Null => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Handles `say_something`: speaks the joined arguments.
pub struct SayHandler {
    service: String,
}

impl SayHandler {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

#[async_trait]
impl CommandHandler for SayHandler {
    async fn handle(
        &self,
        actuators: &ActuatorAccessor,
        args: &[Value],
    ) -> Result<HandlerOutcome, CommandError> {
        let tts = match actuators.get(&self.service).await {
            Ok(Some(tts)) => tts,
            Ok(None) => {
                warn!(service = %self.service, "Text-to-speech actuator unavailable");
                return Ok(HandlerOutcome::Skipped(SkipReason::ActuatorUnavailable));
            }
            Err(e) => {
                warn!(service = %self.service, error = %e, "Text-to-speech actuator unavailable");
                return Ok(HandlerOutcome::Skipped(SkipReason::ActuatorUnresolved));
            }
        };

        if args.is_empty() {
            warn!("No arguments to say");
            return Ok(HandlerOutcome::Skipped(SkipReason::NoArguments));
        }

        let text = join_args(args);
        if text.trim().is_empty() {
            warn!("No valid text to say");
            return Ok(HandlerOutcome::Skipped(SkipReason::NoValidText));
        }

        info!(text = %text, "Saying");
        tts.speak(&text).await?;
        Ok(HandlerOutcome::Performed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::{
        ActuatorError, MockActuator,
        mock::{RecordingActuator, RecordingConnector},
    };
    use serde_json::json;
    use std::sync::Arc;

    fn online() -> (ActuatorAccessor, Arc<RecordingConnector>) {
        let connector = Arc::new(RecordingConnector::new());
        (ActuatorAccessor::online(connector.clone()), connector)
    }

    #[test]
    fn test_join_args_skips_nulls_and_stringifies_scalars() {
        assert_eq!(join_args(&[json!("Hello"), json!("World")]), "Hello World");
        assert_eq!(
            join_args(&[json!("a"), Value::Null, json!(3), json!(true), json!(1.5)]),
            "a 3 true 1.5"
        );
        assert_eq!(join_args(&[Value::Null, Value::Null]), "");
        assert_eq!(join_args(&[]), "");
    }

    #[tokio::test]
    async fn test_speaks_joined_text() {
        let (accessor, connector) = online();
        let handler = SayHandler::new("ALTextToSpeech");

        let outcome = handler
            .handle(&accessor, &[json!("Hello"), json!("World")])
            .await
            .unwrap();

        assert_eq!(outcome, HandlerOutcome::Performed);
        assert_eq!(connector.actuator().spoken(), vec!["Hello World"]);
    }

    #[tokio::test]
    async fn test_offline_skips_without_speaking() {
        let accessor = ActuatorAccessor::offline();
        let handler = SayHandler::new("ALTextToSpeech");

        let outcome = handler.handle(&accessor, &[json!("Hello")]).await.unwrap();

        assert_eq!(
            outcome,
            HandlerOutcome::Skipped(SkipReason::ActuatorUnavailable)
        );
    }

    #[tokio::test]
    async fn test_resolution_failure_is_a_skip() {
        let connector = Arc::new(RecordingConnector::failing_first(
            1,
            ActuatorError::Unreachable {
                address: "http://robot:9559".to_string(),
                reason: "connection refused".to_string(),
            },
        ));
        let accessor = ActuatorAccessor::online(connector.clone());
        let handler = SayHandler::new("ALTextToSpeech");

        let outcome = handler.handle(&accessor, &[json!("Hello")]).await.unwrap();

        assert_eq!(
            outcome,
            HandlerOutcome::Skipped(SkipReason::ActuatorUnresolved)
        );
        assert!(connector.actuator().spoken().is_empty());
    }

    #[tokio::test]
    async fn test_empty_and_null_arguments_are_skipped() {
        let (accessor, connector) = online();
        let handler = SayHandler::new("ALTextToSpeech");

        let outcome = handler.handle(&accessor, &[]).await.unwrap();
        assert_eq!(outcome, HandlerOutcome::Skipped(SkipReason::NoArguments));

        let outcome = handler
            .handle(&accessor, &[Value::Null, Value::Null])
            .await
            .unwrap();
        assert_eq!(outcome, HandlerOutcome::Skipped(SkipReason::NoValidText));

        let outcome = handler.handle(&accessor, &[json!("  ")]).await.unwrap();
        assert_eq!(outcome, HandlerOutcome::Skipped(SkipReason::NoValidText));

        assert!(connector.actuator().spoken().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_text_is_spoken_each_time() {
        let (accessor, connector) = online();
        let handler = SayHandler::new("ALTextToSpeech");

        for _ in 0..2 {
            handler.handle(&accessor, &[json!("again")]).await.unwrap();
        }

        assert_eq!(connector.actuator().spoken(), vec!["again", "again"]);
    }

    #[tokio::test]
    async fn test_remote_failure_propagates() {
        let error = ActuatorError::Remote {
            service: "ALTextToSpeech".to_string(),
            reason: "speech engine busy".to_string(),
        };
        let actuator = Arc::new(RecordingActuator::failing(error.clone()));
        let connector = Arc::new(RecordingConnector::with_actuator(actuator.clone()));
        let accessor = ActuatorAccessor::online(connector);
        let handler = SayHandler::new("ALTextToSpeech");

        let err = handler.handle(&accessor, &[json!("Hi")]).await.unwrap_err();

        assert_eq!(err, CommandError::Actuator(error));
        assert_eq!(actuator.spoken(), vec!["Hi"]);
    }

    struct FixedConnector(Arc<MockActuator>);

    #[async_trait]
    impl crate::actuator::ActuatorConnector for FixedConnector {
        async fn resolve(
            &self,
            _service: &str,
        ) -> Result<Arc<dyn crate::actuator::Actuator>, ActuatorError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_speak_is_called_exactly_once_with_joined_text() {
        let mut actuator = MockActuator::new();
        actuator
            .expect_speak()
            .withf(|text| text.to_string() == "move 2 steps")
            .times(1)
            .returning(|_| Ok(()));
        let accessor = ActuatorAccessor::online(Arc::new(FixedConnector(Arc::new(actuator))));
        let handler = SayHandler::new("ALTextToSpeech");

        let outcome = handler
            .handle(&accessor, &[json!("move"), json!(2), Value::Null, json!("steps")])
            .await
            .unwrap();

        assert_eq!(outcome, HandlerOutcome::Performed);
    }
}
