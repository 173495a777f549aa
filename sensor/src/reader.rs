use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use climate_common::SampleReading;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info};

use crate::{source::SampleSource, SensorError};

pub type SensorResult = Result<SampleReading, SensorError>;

/// Readings in arrival order. The channel closes once the producer is stopped.
pub type ReadingStream = mpsc::Receiver<SensorResult>;

pub(crate) const STREAM_CAPACITY: usize = 16;

/// Anything that yields an ongoing sequence of readings until stopped.
pub trait TemperatureReader: Send {
    /// Begins producing readings. Fails with [`SensorError::AlreadyRunning`] if a previous
    /// stream has not been stopped.
    fn start(&mut self) -> Result<ReadingStream, SensorError>;

    /// Ends the current stream. Safe to call when nothing is running.
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

impl<R: TemperatureReader + ?Sized> TemperatureReader for Box<R> {
    fn start(&mut self) -> Result<ReadingStream, SensorError> {
        (**self).start()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn is_running(&self) -> bool {
        (**self).is_running()
    }
}

/// Polls a [`SampleSource`] immediately on start and then `poll_delay` after each poll
/// completes, so polls never overlap.
pub struct PollingSensor<S> {
    source: Arc<Mutex<S>>,
    poll_delay: Duration,
    task: Option<JoinHandle<()>>,
}

impl<S: SampleSource> PollingSensor<S> {
    pub fn new(source: S, poll_delay: Duration) -> Self {
        Self {
            source: Arc::new(Mutex::new(source)),
            poll_delay,
            task: None,
        }
    }

    pub fn poll_delay(&self) -> Duration {
        self.poll_delay
    }

    /// One synchronous read outside the poll loop.
    pub fn poll_once(&self) -> SensorResult {
        self.source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .poll_once()
    }
}

impl<S: SampleSource> TemperatureReader for PollingSensor<S> {
    fn start(&mut self) -> Result<ReadingStream, SensorError> {
        if self.is_running() {
            return Err(SensorError::AlreadyRunning);
        }

        let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
        let source = Arc::clone(&self.source);
        let poll_delay = self.poll_delay;

        self.task = Some(tokio::spawn(async move {
            loop {
                let result = {
                    let mut source = source.lock().unwrap_or_else(PoisonError::into_inner);
                    source.poll_once()
                };

                if tx.send(result).await.is_err() {
                    debug!("reading stream dropped; polling ends");
                    break;
                }
                tokio::time::sleep(poll_delay).await;
            }
        }));

        info!("sensor polling every {}ms", poll_delay.as_millis());
        Ok(rx)
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("sensor polling stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl<S> Drop for PollingSensor<S> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tokio::time::Instant;

    use super::*;
    use crate::source::FixedSource;

    struct Counting(f32);

    impl SampleSource for Counting {
        fn poll_once(&mut self) -> Result<SampleReading, SensorError> {
            self.0 += 1.0;
            Ok(SampleReading::temperature_only(self.0))
        }
    }

    struct FailsOnEven(u32);

    impl SampleSource for FailsOnEven {
        fn poll_once(&mut self) -> Result<SampleReading, SensorError> {
            self.0 += 1;
            if self.0 % 2 == 0 {
                Err(SensorError::Parse {
                    path: "in_temp_input".into(),
                    value: "nan".into(),
                })
            } else {
                Ok(SampleReading::temperature_only(self.0 as f32))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn polls_immediately_then_after_each_delay() {
        let mut sensor = PollingSensor::new(Counting(0.0), Duration::from_secs(2));
        let began = Instant::now();
        let mut stream = sensor.start().unwrap();

        let first = stream.recv().await.unwrap().unwrap();
        assert_eq!(first.temperature, 1.0);
        assert_eq!(began.elapsed(), Duration::ZERO);

        let second = stream.recv().await.unwrap().unwrap();
        assert_eq!(second.temperature, 2.0);
        assert_eq!(began.elapsed(), Duration::from_secs(2));

        let third = stream.recv().await.unwrap().unwrap();
        assert_eq!(third.temperature, 3.0);
        assert_eq!(began.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_completes_the_stream() {
        let mut sensor = PollingSensor::new(FixedSource::new(70.0), Duration::from_secs(1));
        let mut stream = sensor.start().unwrap();
        assert!(stream.recv().await.is_some());

        sensor.stop();
        sensor.stop();

        while stream.recv().await.is_some() {}
        assert!(!sensor.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn cannot_start_twice() {
        let mut sensor = PollingSensor::new(FixedSource::new(70.0), Duration::from_secs(1));
        let _stream = sensor.start().unwrap();

        assert!(matches!(sensor.start(), Err(SensorError::AlreadyRunning)));
    }

    #[tokio::test(start_paused = true)]
    async fn restarts_after_stop_with_same_source() {
        let mut sensor = PollingSensor::new(Counting(0.0), Duration::from_secs(1));
        let mut stream = sensor.start().unwrap();
        assert_eq!(stream.recv().await.unwrap().unwrap().temperature, 1.0);
        sensor.stop();

        let mut stream = sensor.start().unwrap();
        assert_eq!(stream.recv().await.unwrap().unwrap().temperature, 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn read_errors_do_not_end_the_stream() {
        let mut sensor = PollingSensor::new(FailsOnEven(0), Duration::from_millis(500));
        let mut stream = sensor.start().unwrap();

        assert!(stream.recv().await.unwrap().is_ok());
        assert!(stream.recv().await.unwrap().is_err());
        assert_eq!(stream.recv().await.unwrap().unwrap().temperature, 3.0);
    }

    #[test]
    fn poll_once_reads_synchronously() {
        let sensor = PollingSensor::new(Counting(10.0), Duration::from_secs(1));
        assert_eq!(sensor.poll_once().unwrap().temperature, 11.0);
        assert!(!sensor.is_running());
    }
}
