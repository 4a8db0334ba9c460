use anyhow::Result;
use prometheus::{IntCounter, IntCounterVec, Opts};
use raptor_chain::ChannelMetrics;
use raptor_core::metrics::Metrics;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use tracing::{info, warn};

pub struct EngineMetrics {
    metrics: Metrics,
    pub pending: ChannelMetrics,
    pub txpool: ChannelMetrics,
    pub heads: ChannelMetrics,
    pub swaps_total: IntCounter,
    pub opportunities_total: IntCounterVec,
    pub bundles_total: IntCounterVec,
}

impl EngineMetrics {
    pub fn new() -> Result<Self> {
        let metrics = Metrics::new();
        let registry = metrics.registry();
        let pending = ChannelMetrics::new(registry, "pending")?;
        let txpool = ChannelMetrics::new(registry, "txpool")?;
        let heads = ChannelMetrics::new(registry, "heads")?;
        let swaps_total = IntCounter::with_opts(Opts::new(
            "raptor_swaps_total",
            "Total swap transactions retained from the mempool",
        ))?;
        registry.register(Box::new(swaps_total.clone()))?;
        let opportunities_total = IntCounterVec::new(
            Opts::new(
                "raptor_opportunities_total",
                "Total priced opportunities by recommendation",
            ),
            &["recommendation"],
        )?;
        registry.register(Box::new(opportunities_total.clone()))?;
        let bundles_total = IntCounterVec::new(
            Opts::new("raptor_bundles_total", "Total bundle submissions by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(bundles_total.clone()))?;

        Ok(Self {
            metrics,
            pending,
            txpool,
            heads,
            swaps_total,
            opportunities_total,
            bundles_total,
        })
    }

    pub fn gather(&self) -> String {
        self.metrics.gather()
    }
}

pub fn spawn_metrics_server(bind: &str, metrics: Arc<EngineMetrics>) -> Result<()> {
    let listener = TcpListener::bind(bind)?;
    let bind = bind.to_string();
    thread::spawn(move || {
        info!(%bind, "metrics server listening");
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    if let Err(err) = handle_connection(stream, &metrics) {
                        warn!(?err, "metrics server connection failed");
                    }
                }
                Err(err) => {
                    warn!(?err, "metrics server accept failed");
                }
            }
        }
    });
    Ok(())
}

fn handle_connection(mut stream: TcpStream, metrics: &EngineMetrics) -> Result<()> {
    let mut buffer = [0u8; 512];
    let _ = stream.read(&mut buffer);
    let body = metrics.gather();
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    stream.write_all(response.as_bytes())?;
    Ok(())
}
