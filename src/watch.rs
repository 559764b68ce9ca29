use std::{
    future::{pending, Future},
    io,
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use tokio::{
    signal::unix::{signal, SignalKind},
    time::{sleep, timeout},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    alerts::{alert_message, SendAlert, WebhookAlerts},
    amount::Amount,
    endpoints::load_endpoints,
    env::APP_CONFIG,
    eth::{balance_of_params, decode_quantity},
    log,
    rpc::{HttpTransport, RpcClient, Transport},
};

#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub threshold: Amount,
    pub interval: Duration,
    pub check_timeout: Duration,
    pub alert_timeout: Duration,
    pub once: bool,
    pub exit_after_alert: bool,
}

/// How the watch loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Shutdown,
    Once,
    Alerted,
}

#[derive(Debug)]
struct Balance {
    amount: Amount,
    endpoint: String,
}

enum Check {
    Done(Result<Balance>),
    Cancelled,
}

pub struct Watcher<T: Transport> {
    client: RpcClient<T>,
    params: Value,
    settings: WatchSettings,
    alerts: Option<Box<dyn SendAlert>>,
}

impl<T: Transport> Watcher<T> {
    pub fn new(
        client: RpcClient<T>,
        params: Value,
        settings: WatchSettings,
        alerts: Option<Box<dyn SendAlert>>,
    ) -> Self {
        Self {
            client,
            params,
            settings,
            alerts,
        }
    }

    async fn fetch_balance(&self) -> Result<Balance> {
        let (raw, endpoint) = self.client.call("eth_call", &self.params).await?;
        let hex = raw
            .as_str()
            .ok_or_else(|| anyhow!("decode result: expected hex string, got {}", raw))?;
        let amount = decode_quantity(hex)?.into();
        Ok(Balance {
            amount,
            endpoint: endpoint.name.clone(),
        })
    }

    async fn check(&self, shutdown: &CancellationToken) -> Check {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => Check::Cancelled,
            result = timeout(self.settings.check_timeout, self.fetch_balance()) => {
                let result = result
                    .map_err(|_| anyhow!("balance check timed out after {:?}", self.settings.check_timeout))
                    .and_then(|balance| balance);
                Check::Done(result)
            }
        }
    }

    async fn notify(&self, alerts: &dyn SendAlert, message: &str, shutdown: &CancellationToken) {
        let result = tokio::select! {
            biased;
            _ = shutdown.cancelled() => Err(anyhow!("shutdown before alert was delivered")),
            result = timeout(self.settings.alert_timeout, alerts.send_alert(message)) => result
                .map_err(|_| anyhow!("alert timed out after {:?}", self.settings.alert_timeout))
                .and_then(|sent| sent),
        };

        match result {
            Ok(()) => info!("alert webhook notified"),
            Err(err) => error!(?err, "alert webhook failed"),
        }
    }

    /// Polls until shutdown, a single check when `once` is set, or the
    /// first alert when `exit_after_alert` is set.
    pub async fn run(&self, shutdown: CancellationToken) -> StopReason {
        let mut iteration: u64 = 0;

        loop {
            if iteration > 0 {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => {
                        info!("stopping watcher: shutdown requested");
                        return StopReason::Shutdown;
                    }
                    _ = sleep(self.settings.interval) => {}
                }
            }
            if shutdown.is_cancelled() {
                info!("stopping watcher: shutdown requested");
                return StopReason::Shutdown;
            }

            debug!(iteration, "checking balance");
            match self.check(&shutdown).await {
                Check::Cancelled => {
                    info!("stopping watcher: shutdown during balance check");
                    return StopReason::Shutdown;
                }
                Check::Done(Err(err)) => {
                    error!(?err, "failed to fetch balance");
                }
                Check::Done(Ok(Balance { amount, endpoint })) => {
                    info!(
                        balance = %amount,
                        raw = %amount.base_units(),
                        %endpoint,
                        "fetched USDC balance"
                    );

                    if amount >= self.settings.threshold {
                        warn!(
                            balance = %amount,
                            threshold = %self.settings.threshold,
                            "ALERT: balance reached threshold"
                        );
                        if let Some(alerts) = &self.alerts {
                            let message = alert_message(&amount, &self.settings.threshold);
                            self.notify(alerts.as_ref(), &message, &shutdown).await;
                        }
                        if self.settings.exit_after_alert {
                            return StopReason::Alerted;
                        }
                    }
                }
            }

            if self.settings.once {
                return StopReason::Once;
            }
            iteration += 1;
        }
    }
}

/// Resolves with the name of the first signal that arrived. A listener that
/// fails to install or closes never resolves.
async fn first_signal(
    interrupt: impl Future<Output = io::Result<()>>,
    terminate: impl Future<Output = Option<()>>,
) -> &'static str {
    let interrupt = async move {
        match interrupt.await {
            Ok(()) => {}
            Err(err) => {
                error!(?err, "failed to listen for SIGINT");
                pending::<()>().await;
            }
        }
    };
    let terminate = async move {
        if terminate.await.is_none() {
            error!("SIGTERM listener closed");
            pending::<()>().await;
        }
    };

    tokio::select! {
        _ = interrupt => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}

fn shutdown_on_signal(shutdown: CancellationToken) -> Result<()> {
    let mut terminate = signal(SignalKind::terminate()).context("install SIGTERM handler")?;

    tokio::spawn(async move {
        let name = first_signal(tokio::signal::ctrl_c(), terminate.recv()).await;
        info!(signal = name, "received shutdown signal");
        shutdown.cancel();
    });

    Ok(())
}

/// The per-check timeout must be strictly shorter than the poll interval.
fn effective_check_timeout(check_timeout: Duration, interval: Duration) -> Duration {
    if check_timeout < interval {
        return check_timeout;
    }
    let clamped = interval * 9 / 10;
    warn!(
        ?check_timeout,
        ?interval,
        ?clamped,
        "check timeout not shorter than interval, clamping"
    );
    clamped
}

pub async fn start_watcher() -> Result<()> {
    log::init();

    let endpoints = load_endpoints(&APP_CONFIG.endpoints_path).with_context(|| {
        format!(
            "load endpoints from {}",
            APP_CONFIG.endpoints_path.display()
        )
    })?;
    let client = RpcClient::new(endpoints, HttpTransport::new()?).context("build rpc client")?;
    let params = balance_of_params(&APP_CONFIG.token_contract, &APP_CONFIG.address)
        .context("encode call data")?;

    let check_timeout = effective_check_timeout(APP_CONFIG.check_timeout, APP_CONFIG.interval);

    let settings = WatchSettings {
        threshold: APP_CONFIG.threshold.clone(),
        interval: APP_CONFIG.interval,
        check_timeout,
        alert_timeout: APP_CONFIG.alert_timeout,
        once: APP_CONFIG.once,
        exit_after_alert: APP_CONFIG.alert_exit,
    };
    let alerts = APP_CONFIG
        .alert_url
        .clone()
        .map(|url| Box::new(WebhookAlerts::new(url)) as Box<dyn SendAlert>);

    let shutdown = CancellationToken::new();
    shutdown_on_signal(shutdown.clone())?;

    info!(
        address = %APP_CONFIG.address,
        threshold = %settings.threshold,
        interval = ?settings.interval,
        endpoints = client.endpoints().len(),
        "monitoring USDC balance"
    );

    let watcher = Watcher::new(client, params, settings, alerts);
    let reason = watcher.run(shutdown).await;
    info!(?reason, "watcher stopped");

    Ok(())
}
