//! HTTP client for the robot bridge.
//!
//! The bridge exposes each robot service under `/services/{name}`:
//! a `GET` confirms the service exists, and `POST /services/{name}/speak`
//! with `{"text": "..."}` forwards an utterance. Requests carry no timeout,
//! so a stalled bridge stalls the calling task.

use super::{Actuator, ActuatorConnector, ActuatorError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

#[derive(Serialize)]
struct SpeakRequest<'a> {
    text: &'a str,
}

/// Resolves actuators on a bridge listening at `host:port`.
pub struct HttpActuatorConnector {
    client: Client,
    base_url: String,
}

impl HttpActuatorConnector {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("http://{}:{}", host, port),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn unreachable(&self, err: reqwest::Error) -> ActuatorError {
        ActuatorError::Unreachable {
            address: self.base_url.clone(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl ActuatorConnector for HttpActuatorConnector {
    async fn resolve(&self, service: &str) -> Result<Arc<dyn Actuator>, ActuatorError> {
        let service_url = format!("{}/services/{}", self.base_url, service);
        debug!(url = %service_url, "Looking up actuator service");

        let response = self
            .client
            .get(&service_url)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;

        match response.status() {
            status if status.is_success() => Ok(Arc::new(HttpActuator {
                client: self.client.clone(),
                service: service.to_string(),
                speak_url: format!("{}/speak", service_url),
            })),
            StatusCode::NOT_FOUND => Err(ActuatorError::ServiceNotFound(service.to_string())),
            status => Err(ActuatorError::Remote {
                service: service.to_string(),
                reason: format!("lookup returned {}", status),
            }),
        }
    }
}

/// A resolved service on the bridge.
pub struct HttpActuator {
    client: Client,
    service: String,
    speak_url: String,
}

#[async_trait]
impl Actuator for HttpActuator {
    async fn speak(&self, text: &str) -> Result<(), ActuatorError> {
        let response = self
            .client
            .post(&self.speak_url)
            .json(&SpeakRequest { text })
            .send()
            .await
            .map_err(|e| ActuatorError::Remote {
                service: self.service.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ActuatorError::Remote {
                service: self.service.clone(),
                reason: format!("speak returned {}: {}", status, body),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_built_from_host_and_port() {
        let connector = HttpActuatorConnector::new("192.168.2.196", 9559);
        assert_eq!(connector.base_url(), "http://192.168.2.196:9559");
    }

    #[tokio::test]
    async fn test_unreachable_bridge_is_reported() {
        // Port 9 (discard) on loopback is closed in any sane test environment.
        let connector = HttpActuatorConnector::new("127.0.0.1", 9);
        let err = connector.resolve("ALTextToSpeech").await.err().unwrap();
        assert!(matches!(err, ActuatorError::Unreachable { .. }));
    }
}
