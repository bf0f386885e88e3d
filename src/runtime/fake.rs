// ABOUTME: In-memory runtime double used by unit tests.
// ABOUTME: Models compose projects, their labels, and scripted health results.

use crate::config::Config;
use crate::runtime::traits::sealed::Sealed;
use crate::runtime::traits::{
    COMPOSE_PROJECT_LABEL, COMPOSE_SERVICE_LABEL, ComposeOps, ContainerFilters, ContainerSummary,
    ExecError, ExecOps, ExecResult, InspectError, InspectOps, ProvisionError,
};
use crate::stack::{ENV_PRIORITY, ENV_TRAFFIC_ENABLED};
use crate::types::{Color, ContainerId, Priority, ProjectName};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

/// A recorded runtime call, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Up {
        project: String,
        enabled: bool,
        priority: i64,
    },
    Down {
        project: String,
    },
    Exec {
        container: String,
    },
}

/// How the service in a project answers health probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Healthy,
    Unhealthy,
    /// Fails this many probes, then succeeds.
    HealthyAfter(u32),
    /// The exec finishes without a readable exit code.
    Indeterminate,
}

#[derive(Debug, Clone)]
struct Stack {
    running: bool,
    generation: u32,
    labels: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct State {
    stacks: HashMap<String, Stack>,
    health: HashMap<String, Health>,
    probes: HashMap<String, u32>,
    calls: Vec<Call>,
    fail_up: Vec<(String, usize)>,
    up_counts: HashMap<String, usize>,
    recreate_after: HashMap<String, usize>,
    unreachable: bool,
}

pub struct FakeRuntime {
    app: String,
    service: String,
    traffic_label: String,
    traffic_value: String,
    priority_label: String,
    state: Mutex<State>,
}

impl FakeRuntime {
    pub fn new(config: &Config) -> Self {
        Self {
            app: config.app.to_string(),
            service: config.service.to_string(),
            traffic_label: config.traffic_label.clone(),
            traffic_value: config.traffic_value.clone(),
            priority_label: config.priority_label(),
            state: Mutex::new(State::default()),
        }
    }

    fn project(&self, color: Color) -> String {
        format!("{}-{}", self.app, color)
    }

    fn labels_for(&self, project: &str, enabled: &str, priority: &str) -> HashMap<String, String> {
        let mut labels = HashMap::new();
        labels.insert(COMPOSE_PROJECT_LABEL.to_string(), project.to_string());
        labels.insert(COMPOSE_SERVICE_LABEL.to_string(), self.service.clone());
        labels.insert(self.traffic_label.clone(), enabled.to_string());
        labels.insert(self.priority_label.clone(), priority.to_string());
        labels
    }

    /// Seed a running stack as if provisioned by an earlier invocation.
    pub fn seed(&self, color: Color, enabled: bool, priority: i64) {
        let project = self.project(color);
        let value = if enabled {
            self.traffic_value.clone()
        } else {
            "false".to_string()
        };
        let labels = self.labels_for(&project, &value, &priority.to_string());
        self.state.lock().stacks.insert(
            project,
            Stack {
                running: true,
                generation: 1,
                labels,
            },
        );
    }

    /// Overwrite a single label on a running stack's service container.
    pub fn set_label(&self, color: Color, key: &str, value: &str) {
        let project = self.project(color);
        if let Some(stack) = self.state.lock().stacks.get_mut(&project) {
            stack.labels.insert(key.to_string(), value.to_string());
        }
    }

    pub fn set_health(&self, color: Color, health: Health) {
        let project = self.project(color);
        self.state.lock().health.insert(project, health);
    }

    /// Make the `nth` (1-based) `up` of this color fail.
    pub fn fail_up(&self, color: Color, nth: usize) {
        let project = self.project(color);
        self.state.lock().fail_up.push((project, nth));
    }

    /// Replace the project's container (new id, same labels) right after
    /// it has been listed `listings` more times.
    pub fn recreate_after_listings(&self, color: Color, listings: usize) {
        let project = self.project(color);
        self.state.lock().recreate_after.insert(project, listings);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn is_running(&self, color: Color) -> bool {
        let project = self.project(color);
        self.state
            .lock()
            .stacks
            .get(&project)
            .is_some_and(|s| s.running)
    }

    pub fn is_enabled(&self, color: Color) -> bool {
        let project = self.project(color);
        self.state.lock().stacks.get(&project).is_some_and(|s| {
            s.running && s.labels.get(&self.traffic_label) == Some(&self.traffic_value)
        })
    }

    pub fn priority(&self, color: Color) -> Option<Priority> {
        let project = self.project(color);
        self.state
            .lock()
            .stacks
            .get(&project)
            .and_then(|s| s.labels.get(&self.priority_label))
            .and_then(|p| p.parse().ok())
            .map(Priority::new)
    }

    pub fn probe_count(&self, color: Color) -> u32 {
        let project = self.project(color);
        self.state
            .lock()
            .probes
            .get(&project)
            .copied()
            .unwrap_or(0)
    }

    fn container_id(project: &str, service: &str, generation: u32) -> String {
        format!("{project}-{service}-{generation}")
    }
}

impl Sealed for FakeRuntime {}

#[async_trait]
impl InspectOps for FakeRuntime {
    async fn list_running(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, InspectError> {
        let mut state = self.state.lock();
        if state.unreachable {
            return Err(InspectError::Unreachable("fake daemon down".to_string()));
        }

        let mut found: Vec<_> = state
            .stacks
            .iter()
            .filter(|(_, stack)| stack.running && filters.matches(&stack.labels))
            .map(|(project, stack)| ContainerSummary {
                id: ContainerId::new(Self::container_id(
                    project,
                    &self.service,
                    stack.generation,
                )),
                name: format!("{project}-{}-1", self.service),
                labels: stack.labels.clone(),
            })
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));

        let State {
            stacks,
            recreate_after,
            ..
        } = &mut *state;
        for summary in &found {
            let Some(project) = summary.labels.get(COMPOSE_PROJECT_LABEL) else {
                continue;
            };
            if let Some(remaining) = recreate_after.get_mut(project) {
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    recreate_after.remove(project);
                    if let Some(stack) = stacks.get_mut(project) {
                        stack.generation += 1;
                    }
                }
            }
        }
        Ok(found)
    }

    async fn inspect_labels(
        &self,
        id: &ContainerId,
    ) -> Result<HashMap<String, String>, InspectError> {
        let state = self.state.lock();
        if state.unreachable {
            return Err(InspectError::Unreachable("fake daemon down".to_string()));
        }

        state
            .stacks
            .iter()
            .find(|(project, stack)| {
                Self::container_id(project, &self.service, stack.generation) == id.as_str()
            })
            .map(|(_, stack)| stack.labels.clone())
            .ok_or_else(|| InspectError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl ExecOps for FakeRuntime {
    async fn exec(
        &self,
        container: &ContainerId,
        _cmd: &[String],
    ) -> Result<ExecResult, ExecError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Exec {
            container: container.to_string(),
        });

        let project = state
            .stacks
            .iter()
            .find(|(project, stack)| {
                stack.running
                    && Self::container_id(project, &self.service, stack.generation)
                        == container.as_str()
            })
            .map(|(project, _)| project.clone())
            .ok_or_else(|| ExecError::ContainerNotFound(container.to_string()))?;

        let attempt = {
            let count = state.probes.entry(project.clone()).or_insert(0);
            *count += 1;
            *count
        };

        let healthy = match state.health.get(&project).copied().unwrap_or(Health::Healthy) {
            Health::Healthy => true,
            Health::Unhealthy => false,
            Health::HealthyAfter(failures) => attempt > failures,
            Health::Indeterminate => {
                return Err(ExecError::Failed(format!(
                    "exec in {project} finished without an exit code"
                )));
            }
        };

        Ok(ExecResult {
            exit_code: if healthy { 0 } else { 1 },
            stdout: Vec::new(),
            stderr: if healthy {
                Vec::new()
            } else {
                b"connection refused".to_vec()
            },
        })
    }
}

#[async_trait]
impl ComposeOps for FakeRuntime {
    async fn up(
        &self,
        project: &ProjectName,
        env: &HashMap<String, String>,
    ) -> Result<(), ProvisionError> {
        let mut state = self.state.lock();
        let name = project.as_str().to_string();
        let enabled_value = env.get(ENV_TRAFFIC_ENABLED).cloned().unwrap_or_default();
        let priority_value = env.get(ENV_PRIORITY).cloned().unwrap_or_default();

        state.calls.push(Call::Up {
            project: name.clone(),
            enabled: enabled_value == self.traffic_value,
            priority: priority_value.parse().unwrap_or(-1),
        });

        let nth = {
            let count = state.up_counts.entry(name.clone()).or_insert(0);
            *count += 1;
            *count
        };
        if state.fail_up.iter().any(|(p, n)| *p == name && *n == nth) {
            return Err(ProvisionError::Failed {
                command: format!("fake compose -p {name} up"),
                code: Some(1),
                stderr: "pull access denied".to_string(),
            });
        }

        let labels = self.labels_for(&name, &enabled_value, &priority_value);
        let stack = state.stacks.entry(name).or_insert(Stack {
            running: false,
            generation: 0,
            labels: HashMap::new(),
        });
        // Label changes recreate the container, like compose does.
        if !stack.running || stack.labels != labels {
            stack.generation += 1;
        }
        stack.running = true;
        stack.labels = labels;
        Ok(())
    }

    async fn down(&self, project: &ProjectName) -> Result<(), ProvisionError> {
        let mut state = self.state.lock();
        let name = project.as_str().to_string();
        state.calls.push(Call::Down {
            project: name.clone(),
        });
        state.stacks.remove(&name);
        Ok(())
    }
}
