mod model;

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use candle_core::{DType, Device, Tensor};
use parallel_inference::{Dispatcher, InferenceMode};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use crate::model::Linear;

const FEATURES: usize = 16;
const LABELS: [&str; 4] = ["cat", "dog", "bird", "fish"];

fn predicted(dispatcher: &Dispatcher<Tensor, Linear>, logits: &Tensor) -> String {
    let index = logits.argmax(1)
        .and_then(|t| t.to_dtype(DType::U32))
        .and_then(|t| t.to_vec1::<u32>())
        .ok()
        .and_then(|v| v.first().copied())
        .unwrap_or_default() as usize;
    dispatcher.labels()
        .and_then(|labels| labels.get(index))
        .cloned()
        .unwrap_or_else(|| index.to_string())
}

fn sequential(device: &Device) -> Result<(), Box<dyn std::error::Error>> {
    let dispatcher = Arc::new(
        Dispatcher::builder(Linear::new(FEATURES, LABELS.len(), device)?)
            .workers(2)
            .queue_limit(8)
            .labels(LABELS)
            .build()?,
    );

    let callers = (0..8).map(|caller| {
        let dispatcher = dispatcher.clone();
        let device = device.clone();
        thread::spawn(move || {
            let input = Tensor::randn(0f32, 1f32, (1, FEATURES), &device)
                .map_err(|e| e.to_string())?;
            let logits = dispatcher.submit_one_blocking(input).map_err(|e| e.to_string())?;
            info!(caller, label = %predicted(&dispatcher, &logits), "sequential prediction");
            Ok::<_, String>(())
        })
    }).collect::<Vec<_>>();

    for caller in callers {
        match caller.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "sequential caller failed"),
            Err(_) => error!("sequential caller panicked"),
        }
    }
    for worker in 0..dispatcher.workers() {
        info!(worker, processed = ?dispatcher.worker_processed(worker), "worker summary");
    }
    dispatcher.shutdown();
    Ok(())
}

async fn batched(device: &Device) -> Result<(), Box<dyn std::error::Error>> {
    let dispatcher = Arc::new(
        Dispatcher::builder(Linear::new(FEATURES, LABELS.len(), device)?)
            .mode(InferenceMode::Batched)
            .workers(2)
            .batch_limit(10)
            .batch_wait(Duration::from_millis(2))
            .labels(LABELS)
            .build()?,
    );

    let handles = (0..100).map(|caller| {
        let dispatcher = dispatcher.clone();
        let device = device.clone();
        tokio::spawn(async move {
            // callers contribute a varying number of rows
            let rows = 1 + caller % 3;
            let input = Tensor::randn(0f32, 1f32, (rows, FEATURES), &device)
                .map_err(|e| e.to_string())?;
            let logits = dispatcher.submit_one(input).await.map_err(|e| e.to_string())?;
            info!(caller, shape = ?logits.dims(), "batched prediction");
            Ok::<_, String>(())
        })
    }).collect::<Vec<_>>();

    for handle in futures::future::join_all(handles).await {
        match handle {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "batched caller failed"),
            Err(e) => error!(error = %e, "batched caller panicked"),
        }
    }
    for worker in 0..dispatcher.workers() {
        info!(worker, processed = ?dispatcher.worker_processed(worker), "worker summary");
    }
    dispatcher.shutdown();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let device = Device::Cpu;
    tokio::task::block_in_place(|| sequential(&device))?;
    batched(&device).await?;
    Ok(())
}
