//! Async facade over the engine and the rewrap service, one method per RPC.
//!
//! Decision pairs are independent, so `GetDecisions` fans them out to tokio's
//! blocking pool and reassembles the responses in request order.

use std::sync::Arc;

use futures::future::join_all;
use tracing::info;

use crate::engine::DecisionEngine;
use crate::error::AuthzError;
use crate::kas::{Kms, RewrapService};
use crate::types::{
    EntityChain, GetDecisionsByTokenRequest, GetDecisionsByTokenResponse, GetDecisionsRequest,
    GetDecisionsResponse, GetEntitlementsRequest, GetEntitlementsResponse, RewrapRequest,
    RewrapResponse,
};

pub const RPC_GET_DECISIONS: &str = "GetDecisions";
pub const RPC_GET_DECISIONS_BY_TOKEN: &str = "GetDecisionsByToken";
pub const RPC_GET_ENTITLEMENTS: &str = "GetEntitlements";
pub const RPC_REWRAP: &str = "Rewrap";

#[derive(Clone)]
pub struct AuthorizationService {
    engine: DecisionEngine,
    rewrap: RewrapService,
}

impl AuthorizationService {
    pub fn new(engine: DecisionEngine, kms: Arc<dyn Kms>) -> Self {
        let rewrap = RewrapService::new(engine.clone(), kms);
        Self { engine, rewrap }
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    pub async fn get_decisions(
        &self,
        request: GetDecisionsRequest,
    ) -> Result<GetDecisionsResponse, AuthzError> {
        let snapshot = self.engine.snapshot()?;
        let mut tasks = Vec::new();

        for decision_request in request.decision_requests {
            let actions = Arc::new(decision_request.actions);
            for resource in decision_request.resource_attributes {
                let resource = Arc::new(resource);
                for chain in &decision_request.entity_chains {
                    let engine = self.engine.clone();
                    let snapshot = Arc::clone(&snapshot);
                    let actions = Arc::clone(&actions);
                    let resource = Arc::clone(&resource);
                    let chain = chain.clone();
                    tasks.push(tokio::task::spawn_blocking(move || {
                        engine.decide_pair(&snapshot, &chain, &resource, &actions)
                    }));
                }
            }
        }

        let decision_responses = join_all(tasks)
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            event = "Rpc",
            rpc = RPC_GET_DECISIONS,
            responses = decision_responses.len(),
            policy = %snapshot.version()
        );
        Ok(GetDecisionsResponse { decision_responses })
    }

    pub async fn get_decisions_by_token(
        &self,
        request: GetDecisionsByTokenRequest,
    ) -> Result<GetDecisionsByTokenResponse, AuthzError> {
        let decision_requests = self
            .engine
            .requests_from_tokens(&request.decision_requests)?;
        let response = self
            .get_decisions(GetDecisionsRequest { decision_requests })
            .await?;

        info!(
            event = "Rpc",
            rpc = RPC_GET_DECISIONS_BY_TOKEN,
            responses = response.decision_responses.len()
        );
        Ok(GetDecisionsByTokenResponse {
            decision_responses: response.decision_responses,
        })
    }

    pub async fn get_entitlements(
        &self,
        request: GetEntitlementsRequest,
    ) -> Result<GetEntitlementsResponse, AuthzError> {
        let engine = self.engine.clone();
        let response =
            tokio::task::spawn_blocking(move || engine.get_entitlements(&request)).await??;
        info!(
            event = "Rpc",
            rpc = RPC_GET_ENTITLEMENTS,
            entities = response.entitlements.len()
        );
        Ok(response)
    }

    /// `caller` is the entity chain the auth layer derived for the request.
    pub async fn rewrap(
        &self,
        request: &RewrapRequest,
        caller: &EntityChain,
    ) -> Result<RewrapResponse, AuthzError> {
        let response = self.rewrap.rewrap(request, caller).await?;
        info!(event = "Rpc", rpc = RPC_REWRAP, caller = %caller.id);
        Ok(response)
    }

    /// `Rewrap` with the caller taken from the request's bearer token.
    pub async fn rewrap_with_bearer(
        &self,
        request: &RewrapRequest,
    ) -> Result<RewrapResponse, AuthzError> {
        let response = self.rewrap.rewrap_with_bearer(request).await?;
        info!(event = "Rpc", rpc = RPC_REWRAP, caller = crate::kas::BEARER_CHAIN_ID);
        Ok(response)
    }
}
