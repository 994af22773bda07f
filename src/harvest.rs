//! Harvest orchestration for the active profile.
//!
//! GI-Cat only answers "start" and "what is the status" requests, so the
//! run is driven from here: discover the harvesters of the active profile
//! once, then start each one and poll `giconf/status` until it reports a
//! terminal state. Resources are handled strictly one after another.
//!
//! A single [`Deadline`] covers every wait of a run. When it expires the
//! run stops polling and returns normally with a warning: the jobs already
//! started keep running server-side and the previous harvest results stay
//! in use. Start failures and error statuses abort the run instead.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::{GiCatClient, HARVEST_STATUS, cache_buster};
use crate::clock::{Clock, Deadline};
use crate::domain::{HarvestStatus, ProfileId, Resource};
use crate::error::GiCatError;
use crate::http::{HttpOutcome, HttpTransport, Request};
use crate::status::{classify, extract_status};
use crate::xml::XmlDocument;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestEvent {
    Discovered {
        profile_id: ProfileId,
        resources: usize,
    },
    Started {
        resource: Resource,
    },
    Polled {
        resource: Resource,
        status: HarvestStatus,
        raw_status: String,
    },
    Completed {
        resource: Resource,
        elapsed: Duration,
    },
    TimedOut {
        resource: Resource,
        budget: Duration,
    },
}

pub trait ProgressSink {
    fn event(&self, event: HarvestEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Completed,
    TimedOut,
}

#[derive(Debug, Clone, Serialize)]
pub struct HarvestReport {
    pub profile_id: ProfileId,
    pub started_at: String,
    pub finished_at: String,
    pub completed: Vec<Resource>,
    pub timed_out: Option<Resource>,
    pub not_started: Vec<Resource>,
}

impl HarvestReport {
    pub fn is_complete(&self) -> bool {
        self.timed_out.is_none() && self.not_started.is_empty()
    }
}

pub struct Harvester<'a, T: HttpTransport, C: Clock> {
    client: &'a GiCatClient<T>,
    clock: C,
    poll_interval: Duration,
}

impl<'a, T: HttpTransport, C: Clock> Harvester<'a, T, C> {
    pub fn new(client: &'a GiCatClient<T>, clock: C, poll_interval: Duration) -> Self {
        Self {
            client,
            clock,
            poll_interval,
        }
    }

    pub fn list_resources(&self, profile_id: &ProfileId) -> Result<Vec<Resource>, GiCatError> {
        self.client.list_resources(profile_id)
    }

    /// Asks the service to start harvesting one resource of the active profile.
    ///
    /// A 200 means the job was accepted, not that it finished. Calling this
    /// twice for the same resource may start two overlapping ingest runs.
    pub fn start_harvest(&self, resource: &Resource) -> Result<(), GiCatError> {
        let profile_id = self.client.active_profile_id()?;
        let endpoint = self.client.endpoint();
        let request = Request::get(endpoint.url(&format!(
            "/services/conf/brokerConfigurations/{profile_id}/harvesters/{}/start",
            resource.id
        )))
        .authorized(endpoint);

        match self.client.send(&request)?.outcome() {
            HttpOutcome::Success => {
                info!(
                    resource = %resource.title,
                    "initiated harvesting; the process may take a couple of minutes"
                );
                Ok(())
            }
            HttpOutcome::HttpError(status) => {
                debug!(resource = %resource.title, status, "harvest start rejected");
                Err(GiCatError::HarvestStart {
                    title: resource.title.clone(),
                })
            }
        }
    }

    /// One request to the status endpoint, classified.
    ///
    /// Non-200 answers and bodies that are empty, not XML or without a
    /// `status` element are reported as pending.
    pub fn poll_status(&self, resource: &Resource) -> Result<(HarvestStatus, String), GiCatError> {
        let endpoint = self.client.endpoint();
        let request = Request::get(endpoint.url(HARVEST_STATUS))
            .query("id", resource.id.clone())
            .query("rand", cache_buster())
            .authorized(endpoint);
        let response = self.client.send(&request)?;

        let raw_status = match response.outcome() {
            HttpOutcome::Success => match XmlDocument::parse(&response.body) {
                Ok(document) => extract_status(&document),
                Err(err) => {
                    debug!(resource = %resource.title, error = %err, "unreadable status document");
                    String::new()
                }
            },
            HttpOutcome::HttpError(status) => {
                debug!(resource = %resource.title, status, "status request rejected");
                String::new()
            }
        };
        Ok((classify(&raw_status), raw_status))
    }

    /// Polls until the resource's job completes, fails, or `deadline` passes.
    ///
    /// The deadline is checked before every request; a request already in
    /// flight is never interrupted.
    pub fn wait_for_completion(
        &self,
        resource: &Resource,
        deadline: &Deadline,
        sink: &dyn ProgressSink,
    ) -> Result<WaitOutcome, GiCatError> {
        let started = self.clock.now();
        loop {
            let Some(remaining) = deadline.remaining(&self.clock) else {
                return Ok(WaitOutcome::TimedOut);
            };
            self.clock.sleep(self.poll_interval.min(remaining));
            if deadline.is_expired(&self.clock) {
                return Ok(WaitOutcome::TimedOut);
            }

            let (status, raw_status) = self.poll_status(resource)?;
            debug!(resource = %resource.title, %status, raw_status = %raw_status, "harvest status");
            sink.event(HarvestEvent::Polled {
                resource: resource.clone(),
                status,
                raw_status: raw_status.clone(),
            });

            match status {
                HarvestStatus::Pending => continue,
                HarvestStatus::Completed => {
                    let elapsed = self.clock.now().saturating_duration_since(started);
                    info!(resource = %resource.title, elapsed_secs = elapsed.as_secs(), "successfully harvested");
                    sink.event(HarvestEvent::Completed {
                        resource: resource.clone(),
                        elapsed,
                    });
                    return Ok(WaitOutcome::Completed);
                }
                HarvestStatus::Error => {
                    return Err(GiCatError::HarvestFailed {
                        title: resource.title.clone(),
                        raw_status,
                    });
                }
            }
        }
    }

    /// Harvests every resource of the active profile under one shared timeout.
    ///
    /// Discovery is not counted against `timeout`. Expiry is not an error:
    /// the report names the resource that was still running, if any, and the
    /// ones never started. No resource is started once the budget is spent.
    pub fn harvest_all_active(
        &self,
        timeout: Duration,
        sink: &dyn ProgressSink,
    ) -> Result<HarvestReport, GiCatError> {
        let started_at = iso_timestamp();
        let profile_id = self.client.active_profile_id()?;
        let resources = self.list_resources(&profile_id)?;
        sink.event(HarvestEvent::Discovered {
            profile_id: profile_id.clone(),
            resources: resources.len(),
        });
        info!(
            profile = %profile_id,
            resources = resources.len(),
            timeout_secs = timeout.as_secs(),
            "max wait time for the current profile"
        );

        let deadline = Deadline::after(&self.clock, timeout);
        let mut completed = Vec::with_capacity(resources.len());
        for (index, resource) in resources.iter().enumerate() {
            // a job started after the budget is gone would never be observed
            if index > 0 && deadline.is_expired(&self.clock) {
                warn!(
                    resource = %resource.title,
                    timeout_secs = timeout.as_secs(),
                    "harvest wait time exhausted; remaining resources keep their previous results"
                );
                sink.event(HarvestEvent::TimedOut {
                    resource: resource.clone(),
                    budget: deadline.budget(),
                });
                return Ok(HarvestReport {
                    profile_id,
                    started_at,
                    finished_at: iso_timestamp(),
                    completed,
                    timed_out: None,
                    not_started: resources[index..].to_vec(),
                });
            }

            self.start_harvest(resource)?;
            sink.event(HarvestEvent::Started {
                resource: resource.clone(),
            });

            match self.wait_for_completion(resource, &deadline, sink)? {
                WaitOutcome::Completed => completed.push(resource.clone()),
                WaitOutcome::TimedOut => {
                    warn!(
                        resource = %resource.title,
                        timeout_secs = timeout.as_secs(),
                        "re-harvest timed out; reusing the previous harvest results"
                    );
                    sink.event(HarvestEvent::TimedOut {
                        resource: resource.clone(),
                        budget: deadline.budget(),
                    });
                    return Ok(HarvestReport {
                        profile_id,
                        started_at,
                        finished_at: iso_timestamp(),
                        completed,
                        timed_out: Some(resource.clone()),
                        not_started: resources[index + 1..].to_vec(),
                    });
                }
            }
        }

        Ok(HarvestReport {
            profile_id,
            started_at,
            finished_at: iso_timestamp(),
            completed,
            timed_out: None,
            not_started: Vec::new(),
        })
    }
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
