//! Control plane boundary
//!
//! The remote service that owns stacks. The reconciler needs create,
//! update, and describe; delete exists for operator teardown tooling.
//! `applied` returns the description the plane last accepted, which is
//! what the structural diff compares against.

use crate::error::ControlPlaneError;
use async_trait::async_trait;
use dashmap::DashMap;
use slipway_types::{Credential, StackDescription, StackName, StackObservation, StackState};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Remote declarative control plane boundary
///
/// Every call is authenticated with the credential the current run
/// acquired; implementations sign their requests with it.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Request creation of a stack that does not yet exist
    async fn create(
        &self,
        credential: &Credential,
        description: &StackDescription,
    ) -> Result<(), ControlPlaneError>;

    /// Request an update of an existing stack
    async fn update(
        &self,
        credential: &Credential,
        description: &StackDescription,
    ) -> Result<(), ControlPlaneError>;

    /// Observe current state, outputs, and failure reason
    async fn describe(
        &self,
        credential: &Credential,
        name: &StackName,
    ) -> Result<StackObservation, ControlPlaneError>;

    /// The description the plane last accepted for this stack, if any
    async fn applied(
        &self,
        credential: &Credential,
        name: &StackName,
    ) -> Result<Option<StackDescription>, ControlPlaneError>;

    /// Request deletion of a stack
    async fn delete(
        &self,
        credential: &Credential,
        name: &StackName,
    ) -> Result<(), ControlPlaneError>;
}

/// A mutating call recorded by the in-memory plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutatingCall {
    Create(StackName),
    Update(StackName),
    Delete(StackName),
}

/// Scripted in-memory control plane for tests
///
/// Each stack name can carry a queue of observations; `describe` pops
/// the queue and repeats the last entry once exhausted. Create/update
/// can be scripted to fail with a rejection reason.
pub struct InMemoryControlPlane {
    observations: DashMap<StackName, VecDeque<StackObservation>>,
    applied: DashMap<StackName, StackDescription>,
    calls: Mutex<Vec<MutatingCall>>,
    reject_create: DashMap<StackName, String>,
    reject_update: DashMap<StackName, String>,
    last_access_key: Mutex<Option<String>>,
}

impl InMemoryControlPlane {
    pub fn new() -> Self {
        Self {
            observations: DashMap::new(),
            applied: DashMap::new(),
            calls: Mutex::new(Vec::new()),
            reject_create: DashMap::new(),
            reject_update: DashMap::new(),
            last_access_key: Mutex::new(None),
        }
    }

    /// Script the sequence of observations `describe` will report
    pub fn script_observations(&self, name: &StackName, sequence: Vec<StackObservation>) {
        self.observations.insert(name.clone(), sequence.into());
    }

    /// Record an already-applied description (stack exists as `Stable`)
    pub fn seed_applied(&self, description: StackDescription) {
        self.applied.insert(description.name.clone(), description);
    }

    /// Make the next create call for `name` fail with `reason`
    pub fn reject_create_with(&self, name: &StackName, reason: impl Into<String>) {
        self.reject_create.insert(name.clone(), reason.into());
    }

    /// Make the next update call for `name` fail with `reason`
    pub fn reject_update_with(&self, name: &StackName, reason: impl Into<String>) {
        self.reject_update.insert(name.clone(), reason.into());
    }

    /// Mutating calls seen so far, in order
    pub fn mutating_calls(&self) -> Vec<MutatingCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Access key id of the most recent call, for asserting that calls
    /// were made with the run's credential
    pub fn last_access_key(&self) -> Option<String> {
        self.last_access_key.lock().unwrap().clone()
    }

    fn record(&self, call: MutatingCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn authenticate(&self, credential: &Credential) {
        *self.last_access_key.lock().unwrap() = Some(credential.access_key_id.clone());
    }
}

impl Default for InMemoryControlPlane {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ControlPlane for InMemoryControlPlane {
    async fn create(
        &self,
        credential: &Credential,
        description: &StackDescription,
    ) -> Result<(), ControlPlaneError> {
        self.authenticate(credential);
        self.record(MutatingCall::Create(description.name.clone()));
        if let Some((_, reason)) = self.reject_create.remove(&description.name) {
            return Err(ControlPlaneError::Rejected(reason));
        }
        self.applied
            .insert(description.name.clone(), description.clone());
        Ok(())
    }

    async fn update(
        &self,
        credential: &Credential,
        description: &StackDescription,
    ) -> Result<(), ControlPlaneError> {
        self.authenticate(credential);
        self.record(MutatingCall::Update(description.name.clone()));
        if let Some((_, reason)) = self.reject_update.remove(&description.name) {
            return Err(ControlPlaneError::Rejected(reason));
        }
        self.applied
            .insert(description.name.clone(), description.clone());
        Ok(())
    }

    async fn describe(
        &self,
        credential: &Credential,
        name: &StackName,
    ) -> Result<StackObservation, ControlPlaneError> {
        self.authenticate(credential);
        if let Some(mut queue) = self.observations.get_mut(name) {
            if queue.len() > 1 {
                return Ok(queue.pop_front().unwrap_or_else(StackObservation::absent));
            }
            if let Some(last) = queue.front() {
                return Ok(last.clone());
            }
        }
        // Unscripted stacks report Stable once applied, Absent otherwise
        if self.applied.contains_key(name) {
            Ok(StackObservation::in_state(StackState::Stable))
        } else {
            Ok(StackObservation::absent())
        }
    }

    async fn applied(
        &self,
        credential: &Credential,
        name: &StackName,
    ) -> Result<Option<StackDescription>, ControlPlaneError> {
        self.authenticate(credential);
        Ok(self.applied.get(name).map(|d| d.clone()))
    }

    async fn delete(
        &self,
        credential: &Credential,
        name: &StackName,
    ) -> Result<(), ControlPlaneError> {
        self.authenticate(credential);
        self.record(MutatingCall::Delete(name.clone()));
        self.applied.remove(name);
        self.observations.remove(name);
        Ok(())
    }
}
