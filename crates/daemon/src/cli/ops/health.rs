use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;

use clap::Args;
use owo_colors::OwoColorize;

use gary_daemon::http_server::api::client::ApiError;
use gary_daemon::http_server::health::{
    LivezRequest, MetricsRequest, MetricsResponse, ReadyzRequest, ReadyzResponse,
};

#[derive(Args, Debug, Clone)]
pub struct Health;

#[derive(Debug)]
pub enum EndpointStatus {
    Ok,
    Degraded,
    Unhealthy(String),
    NotReachable,
}

impl EndpointStatus {
    fn from_error(e: ApiError) -> Self {
        match e {
            ApiError::HttpStatus(code, _) => EndpointStatus::Unhealthy(code.to_string()),
            ApiError::Reqwest(_) => EndpointStatus::NotReachable,
        }
    }
}

#[derive(Debug)]
pub struct HealthOutput {
    pub url: String,
    pub livez: EndpointStatus,
    pub readyz: EndpointStatus,
    /// Watcher status per namespace, when readyz answered
    pub watchers: BTreeMap<String, String>,
    pub files: BTreeMap<String, usize>,
    pub metrics: Option<MetricsResponse>,
}

impl fmt::Display for HealthOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({}):", "Service".bold(), self.url)?;

        let status_str = |s: &EndpointStatus| -> String {
            match s {
                EndpointStatus::Ok => "OK".green().to_string(),
                EndpointStatus::Degraded => "DEGRADED".yellow().to_string(),
                EndpointStatus::Unhealthy(code) => format!("{} ({})", "UNHEALTHY".red(), code),
                EndpointStatus::NotReachable => "NOT REACHABLE".red().to_string(),
            }
        };

        writeln!(f, "  {} {}", "livez:".dimmed(), status_str(&self.livez))?;
        write!(f, "  {} {}", "readyz:".dimmed(), status_str(&self.readyz))?;

        if !self.watchers.is_empty() {
            writeln!(f)?;
            writeln!(f)?;
            write!(f, "{}:", "Watchers".bold())?;
            for (name, status) in &self.watchers {
                let files = self.files.get(name).copied().unwrap_or(0);
                let status = if status == "watching" {
                    status.green().to_string()
                } else {
                    status.yellow().to_string()
                };
                write!(
                    f,
                    "\n  {} {} {}",
                    format!("{}:", name).dimmed(),
                    status,
                    format!("({} files)", files).dimmed()
                )?;
            }
        }

        if let Some(metrics) = &self.metrics {
            writeln!(f)?;
            writeln!(f)?;
            writeln!(f, "{}:", "Requests".bold())?;
            writeln!(
                f,
                "  {} {} {}",
                "served:".dimmed(),
                metrics.requests,
                format!(
                    "(avg {:.2} ms, {:.2}/s over {}s)",
                    metrics.average_response_micros / 1000.0,
                    metrics.requests_per_second,
                    metrics.uptime_secs
                )
                .dimmed()
            )?;
            write!(
                f,
                "  {} {} {}",
                "image cache:".dimmed(),
                metrics.image_cache.entries,
                format!("({} bytes)", metrics.image_cache.bytes).dimmed()
            )?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Health {
    type Error = Infallible;
    type Output = HealthOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let livez = match ctx.client.call(LivezRequest {}).await {
            Ok(_) => EndpointStatus::Ok,
            Err(e) => EndpointStatus::from_error(e),
        };

        let (readyz, report) = match ctx.client.call(ReadyzRequest {}).await {
            Ok(report) if report.is_ok() => (EndpointStatus::Ok, Some(report)),
            Ok(report) => (EndpointStatus::Degraded, Some(report)),
            Err(e) => (EndpointStatus::from_error(e), None),
        };
        let (watchers, files) = match report {
            Some(ReadyzResponse {
                watchers, files, ..
            }) => (watchers, files),
            None => Default::default(),
        };

        let metrics = ctx.client.call(MetricsRequest {}).await.ok();

        Ok(HealthOutput {
            url: ctx.client.base_url().to_string(),
            livez,
            readyz,
            watchers,
            files,
            metrics,
        })
    }
}
