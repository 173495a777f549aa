use std::{future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use climate_common::{
    schedule::next_occurrence, DayGroup, Mode, ScheduleConfig, ScheduleError, ScheduleItem,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub trait WallClock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub struct Scheduler {
    schedule: ScheduleConfig,
    timezone: Tz,
    clock: Arc<dyn WallClock>,
    mode: Option<Mode>,
    jobs: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(schedule: ScheduleConfig) -> Result<Self, ScheduleError> {
        Self::with_clock(schedule, Arc::new(SystemClock))
    }

    pub fn with_clock(
        schedule: ScheduleConfig,
        clock: Arc<dyn WallClock>,
    ) -> Result<Self, ScheduleError> {
        let timezone = schedule.parse_timezone()?;

        Ok(Self {
            schedule,
            timezone,
            clock,
            mode: None,
            jobs: Vec::new(),
        })
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn mode(&self) -> Option<Mode> {
        self.mode
    }

    pub fn init_schedule<F, Fut>(&mut self, mode: Mode, on_fire: F)
    where
        F: Fn(f32) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.mode = Some(mode);

        let Some(table) = self.schedule.for_mode(mode) else {
            info!("no schedule for {mode} mode");
            return;
        };

        let on_fire = Arc::new(on_fire);
        for (days, item) in table.entries() {
            let time = match item.time_of_day() {
                Ok(time) => time,
                Err(err) => {
                    warn!("skipping schedule entry: {err}");
                    continue;
                }
            };

            let job = Job {
                days,
                item: item.clone(),
                time,
                timezone: self.timezone,
                clock: Arc::clone(&self.clock),
            };
            self.jobs.push(tokio::spawn(job.run(Arc::clone(&on_fire))));
        }

        info!("armed {} schedule job(s) for {mode} mode", self.jobs.len());
    }

    pub fn active_jobs(&self) -> usize {
        self.jobs.iter().filter(|job| !job.is_finished()).count()
    }

    pub fn next_fire(&self) -> Option<(DateTime<Tz>, f32)> {
        let table = self.schedule.for_mode(self.mode?)?;
        let now = self.clock.now().with_timezone(&self.timezone);
        table.next_fire(&now)
    }

    pub fn cancel(&mut self) {
        for job in self.jobs.drain(..) {
            job.abort();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct Job {
    days: DayGroup,
    item: ScheduleItem,
    time: chrono::NaiveTime,
    timezone: Tz,
    clock: Arc<dyn WallClock>,
}

impl Job {
    async fn run<F, Fut>(self, on_fire: Arc<F>)
    where
        F: Fn(f32) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut last_fired: Option<DateTime<Tz>> = None;

        loop {
            let now = self.clock.now().with_timezone(&self.timezone);
            let after = match &last_fired {
                Some(fired) if *fired > now => fired.clone(),
                _ => now.clone(),
            };

            let Some(due) = next_occurrence(&after, self.days, self.time) else {
                warn!("schedule entry {} never occurs", self.item.time);
                return;
            };

            let wait = (due.clone() - now)
                .to_std()
                .unwrap_or(Duration::ZERO);
            debug!(
                "next {:?} change to {} at {due}",
                self.days, self.item.temperature
            );
            tokio::time::sleep(wait).await;

            info!(
                "schedule fired: {} -> {}",
                self.item.time, self.item.temperature
            );
            on_fire(self.item.temperature).await;
            last_fired = Some(due);
        }
    }
}
