use std::collections::VecDeque;

use climate_common::SampleReading;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::debug;

use crate::{
    reader::{ReadingStream, TemperatureReader, STREAM_CAPACITY},
    SensorError,
};

/// Sliding window mean over the last `window` readings. The window advances by one sample
/// per push; nothing is produced until it is full.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    window: usize,
    samples: VecDeque<SampleReading>,
}

impl MovingAverage {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            samples: VecDeque::with_capacity(window),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn push(&mut self, reading: SampleReading) -> Option<SampleReading> {
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(reading);

        if self.samples.len() < self.window {
            return None;
        }

        let count = self.samples.len() as f32;
        let temperature = self.samples.iter().map(|s| s.temperature).sum::<f32>() / count;
        // Humidity is averaged only when every sample in the window carries it.
        let humidity = self
            .samples
            .iter()
            .map(|s| s.humidity)
            .sum::<Option<f32>>()
            .map(|total| total / count);

        Some(SampleReading::new(temperature, humidity))
    }
}

/// Smooths another reader's stream. Read errors pass through untouched and never enter the
/// window.
pub struct MovingAverageFilter<R> {
    inner: R,
    window: usize,
    task: Option<JoinHandle<()>>,
}

impl<R: TemperatureReader> MovingAverageFilter<R> {
    pub fn new(inner: R, window: usize) -> Self {
        Self {
            inner,
            window: window.max(1),
            task: None,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }
}

impl<R: TemperatureReader> TemperatureReader for MovingAverageFilter<R> {
    fn start(&mut self) -> Result<ReadingStream, SensorError> {
        if self.is_running() {
            return Err(SensorError::AlreadyRunning);
        }

        let mut upstream = self.inner.start()?;
        let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
        let mut average = MovingAverage::new(self.window);

        self.task = Some(tokio::spawn(async move {
            while let Some(result) = upstream.recv().await {
                let smoothed = match result {
                    Ok(reading) => match average.push(reading) {
                        Some(mean) => Ok(mean),
                        None => continue,
                    },
                    Err(err) => Err(err),
                };

                if tx.send(smoothed).await.is_err() {
                    debug!("filtered stream dropped");
                    break;
                }
            }
        }));

        Ok(rx)
    }

    fn stop(&mut self) {
        self.inner.stop();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl<R> Drop for MovingAverageFilter<R> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
