//! Govee LAN API light
//!
//! Commands are single JSON datagrams sent to UDP port 4003 of the
//! controller. The protocol is fire-and-forget: a successful send is the
//! only acknowledgement available.

use crate::{DriverError, DriverResult, LightDriver};
use async_trait::async_trait;
use coffin_core::{GoveeConfig, Rgb};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, trace};

/// Half period of one flash cycle
const FLASH_INTERVAL: Duration = Duration::from_millis(300);

pub struct GoveeLight {
    socket: UdpSocket,
    target: SocketAddr,
    flash_interval: Duration,
}

impl GoveeLight {
    /// Bind a local socket and target the configured controller
    pub async fn connect(config: &GoveeConfig) -> DriverResult<Self> {
        let target: SocketAddr = format!("{}:{}", config.ip, config.port)
            .parse()
            .map_err(|e| DriverError::Failed(format!("invalid Govee address '{}': {}", config.ip, e)))?;
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| DriverError::io("govee", e))?;

        debug!(%target, "Govee light ready");
        Ok(Self {
            socket,
            target,
            flash_interval: FLASH_INTERVAL,
        })
    }

    /// Override the flash half period
    pub fn with_flash_interval(mut self, interval: Duration) -> Self {
        self.flash_interval = interval;
        self
    }

    async fn send(&self, command: Value) -> DriverResult<()> {
        let payload = command.to_string();
        trace!(payload = %payload, "Sending Govee command");
        self.socket
            .send_to(payload.as_bytes(), self.target)
            .await
            .map_err(|e| DriverError::io("govee", e))?;
        Ok(())
    }

    async fn turn(&self, on: bool) -> DriverResult<()> {
        self.send(turn_command(on)).await
    }

    async fn color(&self, color: Rgb) -> DriverResult<()> {
        self.send(color_command(color)).await
    }
}

#[async_trait]
impl LightDriver for GoveeLight {
    async fn set_state(&self, color: Rgb, flash: bool, flash_count: u32) -> DriverResult<()> {
        if color.is_black() && !flash {
            return self.turn(false).await;
        }

        self.turn(true).await?;
        self.color(color).await?;

        if flash {
            for _ in 0..flash_count {
                self.turn(false).await?;
                tokio::time::sleep(self.flash_interval).await;
                self.turn(true).await?;
                tokio::time::sleep(self.flash_interval).await;
            }
        }
        Ok(())
    }
}

fn turn_command(on: bool) -> Value {
    json!({
        "msg": {
            "cmd": "turn",
            "data": { "value": if on { 1 } else { 0 } }
        }
    })
}

fn color_command(color: Rgb) -> Value {
    json!({
        "msg": {
            "cmd": "colorwc",
            "data": {
                "color": { "r": color.r, "g": color.g, "b": color.b }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_payloads() {
        assert_eq!(turn_command(true)["msg"]["data"]["value"], json!(1));
        assert_eq!(turn_command(false)["msg"]["cmd"], json!("turn"));

        let color = color_command(Rgb::new(255, 10, 0));
        assert_eq!(color["msg"]["cmd"], json!("colorwc"));
        assert_eq!(color["msg"]["data"]["color"]["g"], json!(10));
    }

    #[tokio::test]
    async fn test_flash_sends_datagrams() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();

        let light = GoveeLight::connect(&GoveeConfig {
            ip: "127.0.0.1".to_string(),
            port,
        })
        .await
        .unwrap()
        .with_flash_interval(Duration::from_millis(1));

        light.set_state(Rgb::RED, true, 2).await.unwrap();

        // turn on, color, then two off/on pairs
        let mut buf = [0u8; 512];
        let mut commands = Vec::new();
        for _ in 0..6 {
            let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
            let value: Value = serde_json::from_slice(&buf[..len]).unwrap();
            commands.push(value["msg"]["cmd"].as_str().unwrap().to_string());
        }
        assert_eq!(commands, vec!["turn", "colorwc", "turn", "turn", "turn", "turn"]);
    }

    #[tokio::test]
    async fn test_black_turns_off() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();
        let light = GoveeLight::connect(&GoveeConfig {
            ip: "127.0.0.1".to_string(),
            port,
        })
        .await
        .unwrap();

        light.set_state(Rgb::BLACK, false, 0).await.unwrap();

        let mut buf = [0u8; 512];
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        let value: Value = serde_json::from_slice(&buf[..len]).unwrap();
        assert_eq!(value, turn_command(false));
    }

    #[tokio::test]
    async fn test_invalid_address() {
        let result = GoveeLight::connect(&GoveeConfig {
            ip: "not an ip".to_string(),
            port: 4003,
        })
        .await;
        assert!(matches!(result, Err(DriverError::Failed(_))));
    }
}
