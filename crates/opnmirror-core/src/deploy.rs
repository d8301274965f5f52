// ── Deployment orchestrator ──
//
// Validating -> (Conflicted | Clean) -> Applying -> (Applied | Failed)
//
// Each remote create is followed by an optimistic write of the created
// entity. A failed create writes nothing and stops the remaining steps.
// Nothing is rolled back: a retry skips every step whose natural key is
// already in the mirror.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::conflict::{Conflict, ConflictDetector};
use crate::error::CoreError;
use crate::model::{
    Container, DhcpStaticMapping, EntityKind, FirewallRule, PortForward, RuleAction, Vlan,
};
use crate::remote::{RemoteState, bounded};
use crate::spec::{
    ContainerSpec, FirewallRuleSpec, PortForwardSpec, Proposal, StaticMappingSpec, VlanSpec,
};
use crate::store::{MirrorEntity, MirrorStore};

// ── Report types ────────────────────────────────────────────────────

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeploymentState {
    Validating,
    Conflicted,
    Clean,
    Applying,
    Applied,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Created {
        key: String,
    },
    Skipped {
        reason: String,
    },
    Failed {
        error: String,
        error_kind: String,
        retryable: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployStep {
    pub name: String,
    pub kind: EntityKind,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

impl DeployStep {
    fn created(name: impl Into<String>, kind: EntityKind, key: String) -> Self {
        Self {
            name: name.into(),
            kind,
            outcome: StepOutcome::Created { key },
        }
    }

    fn skipped(name: impl Into<String>, kind: EntityKind, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            outcome: StepOutcome::Skipped {
                reason: reason.into(),
            },
        }
    }

    fn failed(name: impl Into<String>, kind: EntityKind, err: &CoreError) -> Self {
        Self {
            name: name.into(),
            kind,
            outcome: StepOutcome::Failed {
                error: err.to_string(),
                error_kind: err.label().to_owned(),
                retryable: err.is_retryable(),
            },
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, StepOutcome::Failed { .. })
    }
}

/// Outcome of deploying one declared resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployReport {
    pub resource: String,
    pub state: DeploymentState,
    pub forced: bool,
    pub conflicts: Vec<Conflict>,
    pub steps: Vec<DeployStep>,
    pub message: String,
}

impl DeployReport {
    pub fn success(&self) -> bool {
        self.state == DeploymentState::Applied
    }
}

// ── Orchestrator ────────────────────────────────────────────────────

pub struct Orchestrator {
    store: Arc<MirrorStore>,
    remote: Arc<dyn RemoteState>,
    timeout: Duration,
    default_wan: String,
}

/// A step failed; the remaining steps are not attempted.
struct Halted;

/// Step list under construction.
struct Steps(Vec<DeployStep>);

impl Steps {
    fn push(&mut self, step: DeployStep) -> Result<(), Halted> {
        let failed = step.is_failed();
        self.0.push(step);
        if failed { Err(Halted) } else { Ok(()) }
    }
}

impl Orchestrator {
    pub fn new(
        store: Arc<MirrorStore>,
        remote: Arc<dyn RemoteState>,
        timeout: Duration,
        default_wan: impl Into<String>,
    ) -> Self {
        Self {
            store,
            remote,
            timeout,
            default_wan: default_wan.into(),
        }
    }

    /// Deploy one proposal. Invalid input is an error; every other
    /// outcome, conflicts and remote failures included, is a report.
    pub async fn deploy(&self, proposal: &Proposal, force: bool) -> Result<DeployReport, CoreError> {
        let resource = proposal.label();
        proposal.validate()?;

        let report = ConflictDetector::new(&self.store, &self.default_wan).check(proposal);
        if !report.clean {
            if !force {
                info!(%resource, conflicts = report.conflicts.len(), "deployment blocked by conflicts");
                return Ok(DeployReport {
                    message: format!(
                        "{resource} has {} conflict(s); resolve them or deploy with force",
                        report.conflicts.len()
                    ),
                    resource,
                    state: DeploymentState::Conflicted,
                    forced: false,
                    conflicts: report.conflicts,
                    steps: Vec::new(),
                });
            }
            warn!(
                %resource,
                conflicts = %report.summary(),
                "forcing deployment over conflicts"
            );
        }

        let mut steps = Steps(Vec::new());
        // A halted run is visible as the failed step below.
        let _halted = match proposal {
            Proposal::Vlan(spec) => self.apply_vlan(spec, &mut steps).await,
            Proposal::PortForward(spec) => self.apply_port_forward(spec, &mut steps).await,
            Proposal::Container(spec) => self.apply_container(spec, &mut steps).await,
        };

        let steps = steps.0;
        let (state, message) = match steps.iter().find(|s| s.is_failed()) {
            Some(step) => {
                let error = match &step.outcome {
                    StepOutcome::Failed { error, .. } => error.as_str(),
                    _ => "",
                };
                warn!(%resource, step = %step.name, %error, "deployment failed");
                (
                    DeploymentState::Failed,
                    format!("{resource} failed at '{}': {error}", step.name),
                )
            }
            None => {
                info!(%resource, steps = steps.len(), forced = force && !report.clean, "deployment applied");
                (DeploymentState::Applied, format!("{resource} deployed"))
            }
        };

        Ok(DeployReport {
            resource,
            state,
            forced: force && !report.clean,
            conflicts: report.conflicts,
            steps,
            message,
        })
    }

    // ── Single-entity proposals ──────────────────────────────────────

    async fn apply_vlan(&self, spec: &VlanSpec, steps: &mut Steps) -> Result<(), Halted> {
        let step = match self.create_vlan(spec).await {
            Ok(vlan) => DeployStep::created("create vlan", EntityKind::Vlan, vlan.natural_key()),
            Err(e) => DeployStep::failed("create vlan", EntityKind::Vlan, &e),
        };
        steps.push(step)
    }

    async fn apply_port_forward(&self, spec: &PortForwardSpec, steps: &mut Steps) -> Result<(), Halted> {
        let step = match self.create_port_forward(spec).await {
            Ok(pf) => DeployStep::created(
                "create port forward",
                EntityKind::PortForward,
                pf.natural_key(),
            ),
            Err(e) => DeployStep::failed("create port forward", EntityKind::PortForward, &e),
        };
        steps.push(step)
    }

    // ── Container ────────────────────────────────────────────────────

    async fn apply_container(&self, spec: &ContainerSpec, steps: &mut Steps) -> Result<(), Halted> {
        let wan = spec
            .wan_interface
            .clone()
            .unwrap_or_else(|| self.default_wan.clone());
        let ip = spec.network.ip_address;

        // 1. VLAN
        let vlan_spec = spec.vlan();
        let vlan = match self.store.find::<Vlan>(&vlan_spec.natural_key()) {
            Some(existing) => {
                steps.push(DeployStep::skipped(
                    "ensure vlan",
                    EntityKind::Vlan,
                    format!("vlan {} exists", existing.natural_key()),
                ))?;
                existing
            }
            None => match self.create_vlan(&vlan_spec).await {
                Ok(vlan) => {
                    steps.push(DeployStep::created(
                        "ensure vlan",
                        EntityKind::Vlan,
                        vlan.natural_key(),
                    ))?;
                    Arc::new(vlan)
                }
                Err(e) => return steps.push(DeployStep::failed("ensure vlan", EntityKind::Vlan, &e)),
            },
        };

        // The VLAN's logical interface carries the DHCP scope and the rule.
        let scope = (!vlan.device.is_empty())
            .then(|| self.store.interface_for_device(&vlan.device))
            .flatten()
            .map(|i| i.name.clone());

        // 2. DHCP reservation
        let step = "reserve address";
        match &scope {
            None => steps.push(DeployStep::skipped(
                step,
                EntityKind::DhcpStaticMapping,
                format!(
                    "vlan {} has no assigned interface; assign one on the appliance and redeploy",
                    vlan.natural_key()
                ),
            ))?,
            Some(scope) => {
                let key = DhcpStaticMapping::key_for(scope, &spec.network.mac_address);
                match self.store.find::<DhcpStaticMapping>(&key) {
                    Some(existing) if existing.ip_address == ip => steps.push(DeployStep::skipped(
                        step,
                        EntityKind::DhcpStaticMapping,
                        format!("reservation {key} exists"),
                    ))?,
                    Some(existing) => {
                        let err = CoreError::validation(
                            "network.mac_address",
                            format!(
                                "{} is already reserved as {} in scope {scope}",
                                spec.network.mac_address, existing.ip_address
                            ),
                        );
                        return steps.push(DeployStep::failed(
                            step,
                            EntityKind::DhcpStaticMapping,
                            &err,
                        ));
                    }
                    None => {
                        let mapping = StaticMappingSpec {
                            scope: scope.clone(),
                            mac_address: spec.network.mac_address.clone(),
                            ip_address: ip,
                            hostname: spec.name.clone(),
                            description: format!("container {}", spec.name),
                        };
                        let outcome = match self.create_static_mapping(&mapping).await {
                            Ok(m) => DeployStep::created(
                                step,
                                EntityKind::DhcpStaticMapping,
                                m.natural_key(),
                            ),
                            Err(e) => DeployStep::failed(step, EntityKind::DhcpStaticMapping, &e),
                        };
                        steps.push(outcome)?;
                    }
                }
            }
        }

        // 3. Internet access
        if spec.network.allow_internet {
            let step = "allow internet";
            match &scope {
                None => steps.push(DeployStep::skipped(
                    step,
                    EntityKind::FirewallRule,
                    "no interface to attach the rule to",
                ))?,
                Some(scope) => {
                    let rule = FirewallRuleSpec {
                        interface: scope.clone(),
                        action: RuleAction::Pass,
                        protocol: "any".into(),
                        source: ip.to_string(),
                        destination: "any".into(),
                        destination_port: String::new(),
                        description: format!("allow internet for {}", spec.name),
                    };
                    let exists = self.store.list::<FirewallRule>().iter().any(|r| {
                        r.enabled
                            && r.interface == rule.interface
                            && r.action == RuleAction::Pass
                            && r.source == rule.source
                            && r.description == rule.description
                    });
                    if exists {
                        steps.push(DeployStep::skipped(
                            step,
                            EntityKind::FirewallRule,
                            format!("pass rule for {ip} on {scope} exists"),
                        ))?;
                    } else {
                        let outcome = match self.create_firewall_rule(&rule).await {
                            Ok(r) => DeployStep::created(step, EntityKind::FirewallRule, r.id),
                            Err(e) => DeployStep::failed(step, EntityKind::FirewallRule, &e),
                        };
                        steps.push(outcome)?;
                    }
                }
            }
        }

        // 4. Published ports
        for port in &spec.ports {
            let forward = PortForwardSpec {
                interface: wan.clone(),
                protocol: port.protocol.clone(),
                external_port: port.host_port,
                internal_ip: ip,
                internal_port: Some(port.container_port),
                description: format!("{} {}/{}", spec.name, port.host_port, port.protocol),
            };
            let step = format!("forward {}/{}", port.host_port, port.protocol);
            let key = PortForward::key_for(&wan, &forward.protocol, &forward.external());
            // Only this container's own live forward counts as done. A
            // disabled or foreign one is replaced by the create below.
            let target = ip.to_string();
            let done = self.store.find::<PortForward>(&key).is_some_and(|pf| {
                pf.enabled && pf.internal_ip == target && pf.internal_port == forward.internal()
            });
            if done {
                steps.push(DeployStep::skipped(
                    step,
                    EntityKind::PortForward,
                    format!("port forward {key} to {target} exists"),
                ))?;
                continue;
            }
            let outcome = match self.create_port_forward(&forward).await {
                Ok(pf) => DeployStep::created(step, EntityKind::PortForward, pf.natural_key()),
                Err(e) => DeployStep::failed(step, EntityKind::PortForward, &e),
            };
            steps.push(outcome)?;
        }

        // 5. Record
        let record = spec.to_record(&wan);
        let key = record.natural_key();
        self.store.upsert::<Container>(record);
        steps.push(DeployStep::created("record container", EntityKind::Container, key))
    }

    // ── Remote create + optimistic write ─────────────────────────────

    async fn create_vlan(&self, spec: &VlanSpec) -> Result<Vlan, CoreError> {
        let op = format!("create vlan {}", spec.natural_key());
        let vlan = bounded(self.timeout, &op, self.remote.create_vlan(spec)).await?;
        self.store.upsert(vlan.clone());
        Ok(vlan)
    }

    async fn create_port_forward(&self, spec: &PortForwardSpec) -> Result<PortForward, CoreError> {
        let op = format!(
            "create port forward {}/{}/{}",
            spec.interface, spec.protocol, spec.external_port
        );
        let pf = bounded(self.timeout, &op, self.remote.create_port_forward(spec)).await?;
        self.store.upsert(pf.clone());
        Ok(pf)
    }

    async fn create_static_mapping(
        &self,
        spec: &StaticMappingSpec,
    ) -> Result<DhcpStaticMapping, CoreError> {
        let op = format!("create dhcp reservation {}/{}", spec.scope, spec.mac_address);
        let mapping = bounded(self.timeout, &op, self.remote.create_static_mapping(spec)).await?;
        self.store.upsert(mapping.clone());
        Ok(mapping)
    }

    async fn create_firewall_rule(&self, spec: &FirewallRuleSpec) -> Result<FirewallRule, CoreError> {
        let op = format!("create firewall rule on {}", spec.interface);
        let rule = bounded(self.timeout, &op, self.remote.create_firewall_rule(spec)).await?;
        self.store.upsert(rule.clone());
        Ok(rule)
    }
}
