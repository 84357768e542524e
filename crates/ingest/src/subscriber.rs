//! MQTT session management: subscription, serial message processing, and
//! bounded-backoff reconnection.

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tracing::{error, info};

use plantops_core::config::MqttConfig;

use crate::pipeline::IngestPipeline;
use crate::TELEMETRY_TOPIC_FILTER;

const RECONNECT_MIN: Duration = Duration::from_secs(1);
const RECONNECT_MAX: Duration = Duration::from_secs(60);

pub struct MqttSubscriber {
    config: MqttConfig,
    pipeline: Arc<IngestPipeline>,
}

impl MqttSubscriber {
    pub fn new(config: MqttConfig, pipeline: Arc<IngestPipeline>) -> Self {
        Self { config, pipeline }
    }

    /// Run the subscription loop forever.
    ///
    /// Messages are processed serially in receive order. On connection loss
    /// the delay doubles from 1 s up to a 60 s cap and resets after a
    /// successful reconnect; the wildcard subscription is re-issued on every
    /// ConnAck.
    pub async fn run(&self) {
        let mut options = MqttOptions::new(
            self.config.client_id.clone(),
            self.config.host.clone(),
            self.config.port,
        );
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(username), Some(password)) =
            (self.config.username.clone(), self.config.password.clone())
        {
            options.set_credentials(username, password);
        }

        let (client, mut eventloop) = AsyncClient::new(options, 64);
        let mut retry_delay = RECONNECT_MIN;

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    retry_delay = RECONNECT_MIN;
                    info!(
                        host = %self.config.host,
                        port = self.config.port,
                        "mqtt connected"
                    );

                    if let Err(e) = client
                        .subscribe(TELEMETRY_TOPIC_FILTER, QoS::AtMostOnce)
                        .await
                    {
                        error!(error = %e, "mqtt subscribe failed");
                    } else {
                        info!(topic = TELEMETRY_TOPIC_FILTER, "mqtt subscribed");
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    self.pipeline
                        .process_message(&publish.topic, &publish.payload)
                        .await;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(
                        error = %e,
                        retry_in_secs = retry_delay.as_secs(),
                        "mqtt disconnected"
                    );
                    tokio::time::sleep(retry_delay).await;
                    retry_delay = (retry_delay * 2).min(RECONNECT_MAX);
                }
            }
        }
    }
}
