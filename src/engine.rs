use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use itertools::Itertools;
use tracing::{debug, error, info};

use crate::config::{ChainSemantics, EngineConfig};
use crate::error::AuthzError;
use crate::resolver::{ClaimsEntityResolver, EntitlementResolver, Entitlements, EntityResolver};
use crate::rules::evaluate_rule;
use crate::store::{PolicySnapshot, PolicyStore};
use crate::timers::{PhaseTimer, as_millis_f64};
use crate::token::chain_from_token;
use crate::types::{
    Action, AttributeValueFqn, Decision, DecisionRequest, DecisionResponse, EntityChain,
    GetEntitlementsRequest, GetEntitlementsResponse, ResourceAttribute, TokenDecisionRequest,
};

/// The decision engine handle. Cloneable and thread-safe.
///
/// Every call takes one snapshot from the store and evaluates against it,
/// so a reload in the middle of a batch is never observed by that batch.
#[derive(Clone)]
pub struct DecisionEngine {
    store: Arc<dyn PolicyStore>,
    resolver: Arc<dyn EntityResolver>,
    config: EngineConfig,
}

/// Outcome of one pair before it is turned into a response.
struct Verdict {
    permitted: bool,
    obligations: Vec<String>,
}

impl DecisionEngine {
    pub fn new(
        store: Arc<dyn PolicyStore>,
        resolver: Arc<dyn EntityResolver>,
        config: EngineConfig,
    ) -> Result<Self, AuthzError> {
        config.validate()?;
        Ok(Self {
            store,
            resolver,
            config,
        })
    }

    /// An engine resolving entities from their own claims, with the default
    /// configuration.
    pub fn with_store(store: Arc<dyn PolicyStore>) -> Self {
        Self {
            store,
            resolver: Arc::new(ClaimsEntityResolver),
            config: EngineConfig::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Result<Arc<PolicySnapshot>, AuthzError> {
        self.store.snapshot()
    }

    /// One response per (entity chain, resource attribute set) pair, ordered
    /// by request, then resource set, then chain.
    ///
    /// Problems with a single pair turn into DENY for that pair. Only a
    /// store that cannot produce a snapshot fails the whole batch.
    pub fn get_decisions(
        &self,
        requests: &[DecisionRequest],
    ) -> Result<Vec<DecisionResponse>, AuthzError> {
        let snapshot = self.snapshot()?;
        let mut responses = Vec::with_capacity(requests.iter().map(|r| r.pair_count()).sum());

        debug!(
            event = "Decisions",
            phase = "Start",
            requests = requests.len(),
            policy = %snapshot.version()
        );

        for request in requests {
            let scope = decision_scope(
                &snapshot,
                request
                    .resource_attributes
                    .iter()
                    .flat_map(|ra| ra.attribute_value_fqns.iter()),
            );
            let mut cache: HashMap<usize, Result<Vec<Entitlements>, AuthzError>> = HashMap::new();

            for resource in &request.resource_attributes {
                for (chain_idx, chain) in request.entity_chains.iter().enumerate() {
                    let mut resolve = Duration::ZERO;
                    let entitlements = cache.entry(chain_idx).or_insert_with(|| {
                        let _timer = PhaseTimer::new(&mut resolve);
                        self.chain_entitlements(&snapshot, chain, &scope)
                    });
                    responses.push(self.respond(
                        &snapshot,
                        chain,
                        entitlements.as_ref(),
                        resource,
                        &request.actions,
                        resolve,
                    ));
                }
            }
        }

        Ok(responses)
    }

    /// Decide a single pair against `snapshot`, resolving the chain's
    /// entitlements from scratch.
    pub fn decide_pair(
        &self,
        snapshot: &PolicySnapshot,
        chain: &EntityChain,
        resource: &ResourceAttribute,
        actions: &[Action],
    ) -> DecisionResponse {
        let scope = decision_scope(snapshot, resource.attribute_value_fqns.iter());
        let mut resolve = Duration::ZERO;
        let entitlements = {
            let _timer = PhaseTimer::new(&mut resolve);
            self.chain_entitlements(snapshot, chain, &scope)
        };
        self.respond(
            snapshot,
            chain,
            entitlements.as_ref(),
            resource,
            actions,
            resolve,
        )
    }

    /// Entitlements of each entity, as value FQN strings.
    pub fn get_entitlements(
        &self,
        request: &GetEntitlementsRequest,
    ) -> Result<GetEntitlementsResponse, AuthzError> {
        let snapshot = self.snapshot()?;
        let resolver = EntitlementResolver::new(&snapshot, self.resolver.as_ref());
        let entitlements = resolver.resolve_entitlements(
            &request.entities,
            request.scope.as_ref(),
            request.with_comprehensive_hierarchy,
        )?;

        info!(
            event = "Entitlements",
            phase = "Done",
            entities = entitlements.len(),
            comprehensive = request.with_comprehensive_hierarchy
        );
        Ok(GetEntitlementsResponse { entitlements })
    }

    /// Decompose each token into an entity chain using the configured rules.
    pub fn requests_from_tokens(
        &self,
        requests: &[TokenDecisionRequest],
    ) -> Result<Vec<DecisionRequest>, AuthzError> {
        requests
            .iter()
            .map(|request| {
                let entity_chains = request
                    .tokens
                    .iter()
                    .map(|token| chain_from_token(token, &self.config.jwt_decomposition))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(DecisionRequest {
                    actions: request.actions.clone(),
                    entity_chains,
                    resource_attributes: request.resource_attributes.clone(),
                })
            })
            .collect()
    }

    /// [`get_decisions`](Self::get_decisions) with chains built from bearer
    /// tokens. A token that cannot be decomposed fails the call.
    pub fn get_decisions_by_token(
        &self,
        requests: &[TokenDecisionRequest],
    ) -> Result<Vec<DecisionResponse>, AuthzError> {
        let requests = self.requests_from_tokens(requests)?;
        self.get_decisions(&requests)
    }

    fn chain_entitlements(
        &self,
        snapshot: &PolicySnapshot,
        chain: &EntityChain,
        scope: &HashSet<AttributeValueFqn>,
    ) -> Result<Vec<Entitlements>, AuthzError> {
        chain.validate()?;
        let resolver = EntitlementResolver::new(snapshot, self.resolver.as_ref());
        chain
            .entities
            .iter()
            .map(|entity| resolver.resolve_entity(entity, Some(scope)))
            .collect()
    }

    fn respond(
        &self,
        snapshot: &PolicySnapshot,
        chain: &EntityChain,
        entitlements: Result<&Vec<Entitlements>, &AuthzError>,
        resource: &ResourceAttribute,
        actions: &[Action],
        resolve: Duration,
    ) -> DecisionResponse {
        let started = Instant::now();
        let default_actions = [Action::transmit()];
        let actions = if actions.is_empty() {
            &default_actions[..]
        } else {
            actions
        };

        let mut rules = Duration::ZERO;
        let outcome = {
            let _timer = PhaseTimer::new(&mut rules);
            match entitlements {
                Ok(entitlements) => self.verdict(snapshot, entitlements, resource, actions),
                Err(e) => Err(e.clone()),
            }
        };

        let verdict = outcome.unwrap_or_else(|e| {
            error!(
                event = "Decision",
                phase = "Error",
                entity_chain = %chain.id,
                resource = %resource.response_id(),
                code = e.code(),
                error = %e,
                "denying pair"
            );
            Verdict {
                permitted: false,
                obligations: Vec::new(),
            }
        });

        let response = DecisionResponse {
            entity_chain_id: chain.id.clone(),
            resource_attributes_id: resource.response_id(),
            action: actions[0].clone(),
            decision: Decision::from_bool(verdict.permitted),
            obligations: verdict.obligations,
        };
        let total = resolve + started.elapsed();

        info!(
            event = "Decision",
            phase = "Result",
            entity_chain = %response.entity_chain_id,
            resource = %response.resource_attributes_id,
            action = %response.action,
            decision = %response.decision,
            obligations = response.obligations.len(),
            elapsed_ms = as_millis_f64(total)
        );

        #[cfg(feature = "observability")]
        crate::metrics::record_decision(
            crate::metrics::DecisionStats {
                duration: total,
                permitted: verdict.permitted,
                entity_chain_id: response.entity_chain_id.clone(),
                resource_attributes_id: response.resource_attributes_id.clone(),
                action: response.action.to_string(),
            },
            crate::metrics::DecisionPhases {
                resolve_ms: as_millis_f64(resolve),
                rules_ms: as_millis_f64(rules),
                total_ms: as_millis_f64(total),
            },
        );

        response
    }

    fn verdict(
        &self,
        snapshot: &PolicySnapshot,
        entitlements: &[Entitlements],
        resource: &ResourceAttribute,
        actions: &[Action],
    ) -> Result<Verdict, AuthzError> {
        let deny = Verdict {
            permitted: false,
            obligations: Vec::new(),
        };
        if resource.attribute_value_fqns.is_empty() || entitlements.is_empty() {
            debug!(
                event = "Decision",
                phase = "Empty",
                resource = %resource.response_id(),
                entities = entitlements.len()
            );
            return Ok(deny);
        }

        let required = resource
            .attribute_value_fqns
            .iter()
            .map(|raw| raw.parse::<AttributeValueFqn>())
            .collect::<Result<Vec<_>, _>>()?;

        let groups = required
            .into_iter()
            .unique()
            .into_group_map_by(|fqn| fqn.definition().clone());

        let mut resolved = Vec::with_capacity(groups.len());
        for (definition_fqn, values) in groups.into_iter().sorted_by(|a, b| a.0.cmp(&b.0)) {
            let definition = snapshot.definition(&definition_fqn).ok_or_else(|| {
                AuthzError::InvalidAttributeFqn(format!(
                    "unknown attribute definition '{definition_fqn}'"
                ))
            })?;
            if let Some(unknown) = values.iter().find(|v| definition.rank_of(v).is_none()) {
                return Err(AuthzError::InvalidAttributeFqn(format!(
                    "unknown attribute value '{unknown}'"
                )));
            }
            resolved.push((definition, values));
        }

        let entity_passes = |entity: &Entitlements| -> Result<bool, AuthzError> {
            for action in actions {
                for (definition, values) in &resolved {
                    if !evaluate_rule(definition, values, entity, action)? {
                        return Ok(false);
                    }
                }
            }
            Ok(true)
        };

        let permitted = match self.config.chain_semantics {
            ChainSemantics::AllEntities => {
                let mut all = true;
                for entity in entitlements {
                    if !entity_passes(entity)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            ChainSemantics::AnyEntity => {
                let mut any = false;
                for entity in entitlements {
                    if entity_passes(entity)? {
                        any = true;
                        break;
                    }
                }
                any
            }
        };

        if !permitted {
            return Ok(deny);
        }

        let obligations: BTreeSet<String> = resolved
            .iter()
            .flat_map(|(definition, values)| {
                values
                    .iter()
                    .filter_map(move |v| definition.find_value(v))
                    .flat_map(|v| v.obligations.iter().cloned())
            })
            .collect();

        Ok(Verdict {
            permitted: true,
            obligations: obligations.into_iter().collect(),
        })
    }
}

/// The value FQNs whose subject mappings matter for a set of resource FQNs:
/// the FQNs themselves plus every value of any HIERARCHY definition they
/// belong to. Malformed FQNs are skipped here and rejected per pair.
fn decision_scope<'a>(
    snapshot: &PolicySnapshot,
    fqns: impl IntoIterator<Item = &'a String>,
) -> HashSet<AttributeValueFqn> {
    let mut scope = HashSet::new();
    for raw in fqns {
        let Ok(fqn) = raw.parse::<AttributeValueFqn>() else {
            continue;
        };
        scope.extend(snapshot.hierarchy(fqn.definition()));
        scope.insert(fqn);
    }
    scope
}

#[cfg(test)]
mod tests;
