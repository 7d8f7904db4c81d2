#[test]
fn test_one_response_per_pair_in_order() {
    let engine = engine();
    let alice = json!({"clearance": "secret"});
    let bob = json!({"clearance": "confidential"});

    let requests = [
        request(
            &[Action::decrypt()],
            vec![chain("alice", &[alice.clone()]), chain("bob", &[bob.clone()])],
            vec![
                resource("ra-secret", &[SECRET]),
                resource("ra-confidential", &[CONFIDENTIAL]),
                resource("ra-topsecret", &[TOPSECRET]),
            ],
        ),
        request(
            &[Action::decrypt()],
            vec![chain("carol", &[bob])],
            vec![resource("ra-any", &[CONFIDENTIAL])],
        ),
    ];

    let responses = engine.get_decisions(&requests).unwrap();
    assert_eq!(
        responses.len(),
        requests.iter().map(|r| r.pair_count()).sum::<usize>()
    );

    let summary: Vec<String> = responses.iter().map(ToString::to_string).collect();
    assert_eq!(
        summary,
        vec![
            "PERMIT(alice -> ra-secret [decrypt])",
            "DENY(bob -> ra-secret [decrypt])",
            "PERMIT(alice -> ra-confidential [decrypt])",
            "PERMIT(bob -> ra-confidential [decrypt])",
            "DENY(alice -> ra-topsecret [decrypt])",
            "DENY(bob -> ra-topsecret [decrypt])",
            "PERMIT(carol -> ra-any [decrypt])",
        ]
    );
}

#[test]
fn test_empty_batch() {
    assert!(engine().get_decisions(&[]).unwrap().is_empty());
    let no_pairs = request(&[Action::decrypt()], vec![], vec![resource("ra", &[SECRET])]);
    assert!(engine().get_decisions(&[no_pairs]).unwrap().is_empty());
}

#[test]
fn test_decisions_are_idempotent() {
    let engine = engine();
    let requests = [request(
        &[Action::decrypt()],
        vec![
            chain("ec1", &[json!({"clearance": "secret", "groups": ["eng"]})]),
            chain("ec2", &[json!({"groups": ["hr"]})]),
        ],
        vec![resource("ra1", &[SECRET, ENG]), resource("ra2", &[HR])],
    )];

    let first = engine.get_decisions(&requests).unwrap();
    let second = engine.get_decisions(&requests).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_clearance_scenario() {
    let engine = engine();
    let e1 = json!({"clearance": "secret"});

    assert_permit(&decide(&engine, e1.clone(), &[SECRET], Action::decrypt()));
    assert_deny(&decide(
        &engine,
        e1.clone(),
        &[SECRET, TOPSECRET],
        Action::decrypt(),
    ));
    assert_permit(&decide(&engine, e1, &[CONFIDENTIAL], Action::decrypt()));
}

#[test]
fn test_clearance_scenario_all_of() {
    const POLICY: &str = r#"{
        "attributes": [{
            "fqn": "ns/attr/clearance",
            "rule": "ALL_OF",
            "values": [{"value": "topsecret"}, {"value": "secret"}]
        }],
        "subjectMappings": [{
            "id": "sm-secret",
            "attributeValueFqn": "ns/attr/clearance/value/secret",
            "subjectConditionSet": {"subjectSets": [{"conditionGroups": [{
                "booleanOperator": "AND",
                "conditions": [{"subjectExternalSelectorValue": ".attrs[]", "operator": "IN", "subjectExternalValues": ["ns/attr/clearance/value/secret"]}]
            }]}]}
        }]
    }"#;
    let store = InMemoryPolicyStore::from_json_str(POLICY).expect("policy should load");
    let engine = DecisionEngine::with_store(Arc::new(store));
    let e1 = json!({"attrs": ["ns/attr/clearance/value/secret"]});

    assert_permit(&decide(
        &engine,
        e1.clone(),
        &["ns/attr/clearance/value/secret"],
        Action::decrypt(),
    ));
    assert_deny(&decide(
        &engine,
        e1,
        &[
            "ns/attr/clearance/value/secret",
            "ns/attr/clearance/value/topsecret",
        ],
        Action::decrypt(),
    ));
}

#[test]
fn test_no_entitlements_denies() {
    let response = decide(&engine(), json!({"name": "nobody"}), &[ENG], Action::decrypt());
    assert_deny(&response);
    assert!(response.obligations.is_empty());
}

#[test]
fn test_empty_resource_attributes_deny() {
    let response = decide(
        &engine(),
        json!({"clearance": "topsecret", "groups": ["eng"]}),
        &[],
        Action::decrypt(),
    );
    assert_deny(&response);
    assert_eq!(response.resource_attributes_id, "ra1");
}

#[parameterized(
    malformed = { "not-an-fqn" },
    unknown_definition = { "https://example.com/attr/nope/value/x" },
    unknown_value = { "https://example.com/attr/dept/value/legal" },
    unspecified_rule = { LEGACY },
)]
fn test_bad_resource_denies_only_that_pair(bad: &str) {
    let engine = engine();
    let everything = json!({"clearance": "topsecret", "groups": ["eng", "legacy"]});
    let responses = engine
        .get_decisions(&[request(
            &[Action::decrypt()],
            vec![chain("ec1", &[everything])],
            vec![resource("bad", &[bad]), resource("good", &[SECRET])],
        )])
        .unwrap();

    assert_eq!(responses.len(), 2);
    assert_deny(&responses[0]);
    assert_eq!(responses[0].resource_attributes_id, "bad");
    assert_permit(&responses[1]);
}

#[test]
fn test_mixed_bad_and_good_fqns_in_one_set_deny() {
    let response = decide(
        &engine(),
        json!({"clearance": "topsecret"}),
        &[SECRET, "https://example.com/attr/nope/value/x"],
        Action::decrypt(),
    );
    assert_deny(&response);
}

#[test]
fn test_untyped_entity_denies_pair() {
    let engine = engine();
    let broken = EntityChain {
        id: "broken".to_string(),
        entities: vec![Entity {
            id: "e1".to_string(),
            entity_type: None,
        }],
    };
    let responses = engine
        .get_decisions(&[request(
            &[Action::decrypt()],
            vec![broken, chain("fine", &[json!({"clearance": "secret"})])],
            vec![resource("ra1", &[SECRET])],
        )])
        .unwrap();
    assert_deny(&responses[0]);
    assert_permit(&responses[1]);
}

#[test]
fn test_store_unavailable_fails_batch() {
    let engine = DecisionEngine::with_store(Arc::new(UnavailableStore));
    let result = engine.get_decisions(&[request(
        &[Action::decrypt()],
        vec![chain("ec1", &[json!({"clearance": "secret"})])],
        vec![resource("ra1", &[SECRET])],
    )]);
    assert!(matches!(
        result,
        Err(AuthzError::PolicyStoreUnavailable(_))
    ));
}

#[test]
fn test_resource_id_falls_back_to_first_fqn() {
    let responses = engine()
        .get_decisions(&[request(
            &[Action::decrypt()],
            vec![chain("ec1", &[json!({"clearance": "secret"})])],
            vec![resource("", &[CONFIDENTIAL, SECRET])],
        )])
        .unwrap();
    assert_eq!(responses[0].resource_attributes_id, CONFIDENTIAL);
    assert_permit(&responses[0]);
}

#[test]
fn test_default_action_is_transmit() {
    let engine = engine();
    let responses = engine
        .get_decisions(&[request(
            &[],
            vec![chain("ec1", &[json!({"projects": ["apollo"]})])],
            vec![resource("ra1", &[APOLLO])],
        )])
        .unwrap();
    assert_eq!(responses[0].action, Action::transmit());
    // apollo is only mapped for decrypt
    assert_deny(&responses[0]);
}

#[test]
fn test_mapping_actions_restrict_grant() {
    let engine = engine();
    let subject = json!({"projects": ["apollo"]});
    assert_permit(&decide(&engine, subject.clone(), &[APOLLO], Action::decrypt()));
    assert_deny(&decide(&engine, subject, &[APOLLO], Action::transmit()));
}

#[test]
fn test_every_requested_action_must_be_permitted() {
    let engine = engine();
    let eng = json!({"groups": ["eng"]});
    let apollo = json!({"projects": ["apollo"]});
    let both = [Action::decrypt(), Action::transmit()];

    let responses = engine
        .get_decisions(&[request(
            &both,
            vec![chain("eng", &[eng]), chain("apollo", &[apollo])],
            vec![resource("eng", &[ENG]), resource("apollo", &[APOLLO])],
        )])
        .unwrap();

    assert_permit(&responses[0]);
    assert_eq!(responses[0].action, Action::decrypt());
    assert_deny(&responses[1]);
    assert_deny(&responses[2]);
    assert_deny(&responses[3]);
}

#[test]
fn test_obligations_on_permit_only() {
    let engine = engine();
    let permitted = decide(
        &engine,
        json!({"projects": ["apollo"], "groups": ["eng"]}),
        &[APOLLO, ENG],
        Action::decrypt(),
    );
    assert_permit(&permitted);
    assert_eq!(permitted.obligations, vec![WATERMARK]);

    let denied = decide(
        &engine,
        json!({"projects": ["apollo"]}),
        &[APOLLO, ENG],
        Action::decrypt(),
    );
    assert_deny(&denied);
    assert!(denied.obligations.is_empty());
}

#[parameterized(
    all_entities_both_cleared = { ChainSemantics::AllEntities, "secret", "topsecret", true },
    all_entities_one_short = { ChainSemantics::AllEntities, "secret", "confidential", false },
    any_entity_one_short = { ChainSemantics::AnyEntity, "secret", "confidential", true },
    any_entity_none_cleared = { ChainSemantics::AnyEntity, "confidential", "confidential", false },
)]
fn test_chain_semantics(semantics: ChainSemantics, first: &str, second: &str, permitted: bool) {
    let engine = engine_with_semantics(semantics);
    let responses = engine
        .get_decisions(&[request(
            &[Action::decrypt()],
            vec![chain(
                "ec1",
                &[json!({"clearance": first}), json!({"clearance": second})],
            )],
            vec![resource("ra1", &[SECRET])],
        )])
        .unwrap();
    assert_eq!(responses[0].decision.is_permit(), permitted, "{}", responses[0]);
}

#[test]
fn test_any_entity_requires_one_entity_to_satisfy_everything() {
    // Each entity covers one group, neither covers both.
    let engine = engine_with_semantics(ChainSemantics::AnyEntity);
    let responses = engine
        .get_decisions(&[request(
            &[Action::decrypt()],
            vec![chain(
                "ec1",
                &[json!({"clearance": "secret"}), json!({"groups": ["eng"]})],
            )],
            vec![resource("ra1", &[SECRET, ENG])],
        )])
        .unwrap();
    assert_deny(&responses[0]);
}

#[test]
fn test_decide_pair_matches_batch() {
    let engine = engine();
    let snapshot = engine.snapshot().unwrap();
    let chain = chain("ec1", &[json!({"clearance": "topsecret", "groups": ["hr"]})]);
    let resources = [
        resource("ra1", &[SECRET, HR]),
        resource("ra2", &[ENG]),
        resource("ra3", &[TOPSECRET]),
    ];

    let batch = engine
        .get_decisions(&[request(
            &[Action::decrypt()],
            vec![chain.clone()],
            resources.to_vec(),
        )])
        .unwrap();
    let single: Vec<DecisionResponse> = resources
        .iter()
        .map(|ra| engine.decide_pair(&snapshot, &chain, ra, &[Action::decrypt()]))
        .collect();
    assert_eq!(batch, single);
}

#[test]
fn test_decisions_snapshot() {
    let engine = engine();
    let responses = engine
        .get_decisions(&[request(
            &[Action::decrypt()],
            vec![chain("ec1", &[json!({"projects": ["apollo"], "country": ["usa"]})])],
            vec![resource("ra1", &[APOLLO]), resource("ra2", &[USA, GBR])],
        )])
        .unwrap();

    insta::with_settings!({sort_maps => true}, {
        insta::assert_json_snapshot!(serde_json::to_value(&responses).unwrap(), @r#"
        [
          {
            "action": {
              "name": "decrypt"
            },
            "decision": "DECISION_PERMIT",
            "entityChainId": "ec1",
            "obligations": [
              "https://example.com/obl/drm/value/watermark"
            ],
            "resourceAttributesId": "ra1"
          },
          {
            "action": {
              "name": "decrypt"
            },
            "decision": "DECISION_DENY",
            "entityChainId": "ec1",
            "obligations": [],
            "resourceAttributesId": "ra2"
          }
        ]
        "#);
    });
}

#[test]
fn test_concurrent_decisions() {
    use std::thread;

    let engine = engine();
    let mut handles = vec![];
    for n in 0..8 {
        let engine = engine.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..25 {
                let level = if n % 2 == 0 { "secret" } else { "confidential" };
                let response = decide(&engine, json!({"clearance": level}), &[SECRET], Action::decrypt());
                assert_eq!(response.decision.is_permit(), n % 2 == 0);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}
