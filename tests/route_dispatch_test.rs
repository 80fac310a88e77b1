//! 路由注册与分发集成测试

use std::sync::{Arc, Mutex};

use plain_routes::router::{
    hooks, listener_fn, priority, CallbackBundle, EventRegistry, HookContext, HookRegistry,
    LifecycleStage, RequestState, Route, RouteState, Router,
};
use plain_routes::{RouteError, StaticTemplateLocator};
use serde_json::{json, Value};

/// 以请求对象的形式发出 parse_request
async fn parse_request(registry: &HookRegistry, request: &RequestState) {
    let value = json!({
        "path": request.path,
        "matched_rule": request.matched_rule,
        "query": {},
    });
    registry
        .emit(Some(request), hooks::PARSE_REQUEST, vec![value])
        .await
        .unwrap();
}

fn stage_hooks() -> [&'static str; 4] {
    [
        LifecycleStage::BeforeQuery.hook_name(),
        LifecycleStage::Title.hook_name(),
        LifecycleStage::Dispatch.hook_name(),
        LifecycleStage::Template.hook_name(),
    ]
}

#[tokio::test]
async fn test_rewrite_only_route_engages_nothing() {
    let registry = HookRegistry::new();
    let bundle = CallbackBundle::builder().rewrite("p=1").build().unwrap();
    let route = Route::create(&registry, "shop(/)?", bundle, vec![]).await.unwrap();

    let scope = registry.fork("req").await;
    let request = RequestState::new("/shop", Some("shop(/)?".to_string()));
    parse_request(&scope, &request).await;

    for hook in stage_hooks() {
        assert_eq!(scope.listener_count(hook).await, 0, "{} 不应有监听器", hook);
    }
    assert_eq!(request.route_state("shop(/)?").await, RouteState::Engaged);
    assert_eq!(route.engagements(), 1);

    // 没有模板监听器，宿主的模板过滤器保持原值
    let emission = scope
        .filter(Some(&request), "template", json!("index.php"), vec![])
        .await
        .unwrap();
    assert!(!emission.is_halted());
    assert_eq!(emission.value, json!("index.php"));
}

#[tokio::test]
async fn test_template_route_halts_at_highest_priority() {
    let registry = HookRegistry::new();
    let bundle = CallbackBundle::builder().template("stripe.php").build().unwrap();
    Route::new("stripe(/)?", bundle, vec![])
        .with_templates(Arc::new(
            StaticTemplateLocator::new().with_template("stripe.php", "<form>stripe</form>"),
        ))
        .register(&registry)
        .await
        .unwrap();

    let later = Arc::new(Mutex::new(0));
    let counter = later.clone();
    registry
        .on(
            "template",
            listener_fn("theme", move |_| {
                *counter.lock().unwrap() += 1;
                Ok(Value::Null)
            }),
            priority::DEFAULT,
            1,
        )
        .await
        .unwrap();

    let scope = registry.fork("req").await;
    let request = RequestState::new("/stripe/", Some("stripe(/)?".to_string()));
    parse_request(&scope, &request).await;

    let listeners = scope.describe("template").await;
    assert_eq!(listeners.len(), 2);
    assert_eq!(listeners[0].priority, priority::HIGHEST);
    assert_eq!(listeners[0].arity, 0);

    let emission = scope
        .filter(Some(&request), "template", json!("index.php"), vec![])
        .await
        .unwrap();
    let page = emission.halted.expect("模板监听器应终止请求");
    assert_eq!(page.template, "stripe.php");
    assert_eq!(page.body, "<form>stripe</form>");
    assert_eq!(*later.lock().unwrap(), 0);
}

#[tokio::test]
async fn test_unmatched_request_keeps_query_var() {
    let registry = HookRegistry::new();
    let bundle = CallbackBundle::builder()
        .on("pre_get_posts", |_| Ok(json!({"x": true})))
        .build()
        .unwrap();
    Route::create(&registry, "x/?$", bundle, vec!["x_id".to_string()])
        .await
        .unwrap();

    let scope = registry.fork("req").await;
    let request = RequestState::new("/y", Some("y/?$".to_string()));
    parse_request(&scope, &request).await;

    assert_eq!(scope.listener_count("pre_get_posts").await, 0);
    assert_eq!(request.route_state("x/?$").await, RouteState::Unmatched);

    let vars = registry
        .filter(None, hooks::QUERY_VARS, json!(["p"]), vec![])
        .await
        .unwrap();
    assert_eq!(vars.value, json!(["p", "x_id"]));
}

#[tokio::test]
async fn test_match_is_string_equality_only() {
    let registry = HookRegistry::new();
    let bundle = CallbackBundle::builder()
        .on("wp", |_| Ok(Value::Null))
        .build()
        .unwrap();
    Route::create(&registry, "shop(/)?", bundle, vec![]).await.unwrap();

    // 路径本身能被模式匹配，但宿主报告的规则不同
    for matched in ["shop", "shop/", "shop(/)", "^shop(/)?", ""] {
        let scope = registry.fork(matched).await;
        let request = RequestState::new("/shop", Some(matched.to_string()));
        parse_request(&scope, &request).await;
        assert_eq!(scope.listener_count("wp").await, 0, "matched = {:?}", matched);
    }

    let scope = registry.fork("none").await;
    let request = RequestState::new("/shop", None);
    parse_request(&scope, &request).await;
    assert_eq!(scope.listener_count("wp").await, 0);
}

#[tokio::test]
async fn test_each_route_contributes_one_rule() {
    let registry = HookRegistry::new();
    let bundles = [
        CallbackBundle::new(),
        CallbackBundle::builder().rewrite("p=2").template("a.php").build().unwrap(),
        CallbackBundle::builder()
            .on("title", |_| Ok(Value::Null))
            .on("dispatch", |_| Ok(Value::Null))
            .build()
            .unwrap(),
    ];

    for (index, bundle) in bundles.into_iter().enumerate() {
        Route::create(
            &registry,
            format!("r{}/?$", index),
            bundle,
            vec![format!("v{}a", index), format!("v{}b", index)],
        )
        .await
        .unwrap();
    }

    let rules = registry
        .filter(None, hooks::REWRITE_RULES, json!([]), vec![])
        .await
        .unwrap();
    let patterns: Vec<&str> = rules
        .value
        .as_array()
        .unwrap()
        .iter()
        .map(|rule| rule["pattern"].as_str().unwrap())
        .collect();
    // 后注册的路由排在更前面
    assert_eq!(patterns, vec!["r2/?$", "r1/?$", "r0/?$"]);

    let vars = registry
        .filter(None, hooks::QUERY_VARS, json!([]), vec![])
        .await
        .unwrap();
    assert_eq!(vars.value.as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn test_forwarders_receive_all_host_arguments() {
    let registry = HookRegistry::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let bundle = CallbackBundle::builder()
        .on("wp_title", move |args| {
            sink.lock().unwrap().push(args.clone());
            Ok(json!(format!("{} Shop", args[0].as_str().unwrap_or(""))))
        })
        .build()
        .unwrap();
    Route::create(&registry, "shop(/)?", bundle, vec![]).await.unwrap();

    let scope = registry.fork("req").await;
    let request = RequestState::new("/shop", Some("shop(/)?".to_string()));
    parse_request(&scope, &request).await;

    let emission = scope
        .filter(Some(&request), "wp_title", json!("Home"), vec![json!("|"), json!("right")])
        .await
        .unwrap();

    assert_eq!(emission.value, json!("Home Shop"));
    assert_eq!(
        seen.lock().unwrap()[0],
        vec![json!("Home"), json!("|"), json!("right")]
    );
}

#[tokio::test]
async fn test_second_parse_request_does_not_engage_twice() {
    let registry = HookRegistry::new();
    let bundle = CallbackBundle::builder()
        .on("wp", |_| Ok(Value::Null))
        .build()
        .unwrap();
    let route = Route::create(&registry, "shop(/)?", bundle, vec![]).await.unwrap();

    let scope = registry.fork("req").await;
    let request = RequestState::new("/shop", Some("shop(/)?".to_string()));
    parse_request(&scope, &request).await;
    parse_request(&scope, &request).await;

    assert_eq!(scope.listener_count("wp").await, 1);
    assert_eq!(route.engagements(), 1);
}

#[tokio::test]
async fn test_request_scopes_do_not_leak() {
    let registry = HookRegistry::new();
    let bundle = CallbackBundle::builder()
        .on("wp", |_| Ok(Value::Null))
        .build()
        .unwrap();
    let route = Route::create(&registry, "shop(/)?", bundle, vec![]).await.unwrap();

    let first = registry.fork("first").await;
    let request = RequestState::new("/shop", Some("shop(/)?".to_string()));
    parse_request(&first, &request).await;
    assert_eq!(first.listener_count("wp").await, 1);

    let second = registry.fork("second").await;
    assert_eq!(second.listener_count("wp").await, 0);
    assert_eq!(registry.listener_count("wp").await, 0);

    let request = RequestState::new("/shop", Some("shop(/)?".to_string()));
    parse_request(&second, &request).await;
    assert_eq!(second.listener_count("wp").await, 1);
    assert_eq!(route.engagements(), 2);
}

#[tokio::test]
async fn test_missing_template_is_error_not_halt() {
    let registry = HookRegistry::new();
    let bundle = CallbackBundle::builder().template("missing.php").build().unwrap();
    Route::new("stripe(/)?", bundle, vec![])
        .with_templates(Arc::new(StaticTemplateLocator::new()))
        .register(&registry)
        .await
        .unwrap();

    let scope = registry.fork("req").await;
    let request = RequestState::new("/stripe", Some("stripe(/)?".to_string()));
    parse_request(&scope, &request).await;

    let result = scope
        .filter(Some(&request), "template", json!("index.php"), vec![])
        .await;
    assert!(matches!(
        result,
        Err(RouteError::TemplateNotFound(name)) if name == "missing.php"
    ));
}

#[tokio::test]
async fn test_engaged_notification_carries_summary() {
    let registry = HookRegistry::new();
    let notices = Arc::new(Mutex::new(Vec::new()));
    let sink = notices.clone();
    registry
        .on(
            hooks::ROUTE_ENGAGED,
            listener_fn("observer", move |args| {
                sink.lock().unwrap().push(args);
                Ok(Value::Null)
            }),
            priority::DEFAULT,
            2,
        )
        .await
        .unwrap();

    let bundle = CallbackBundle::builder()
        .rewrite("p=9")
        .on("before-query", |_| Ok(Value::Null))
        .build()
        .unwrap();
    Route::create(&registry, "shop(/)?", bundle, vec![]).await.unwrap();

    let scope = registry.fork("req").await;
    let request = RequestState::new("/shop", Some("shop(/)?".to_string()));
    parse_request(&scope, &request).await;

    let notices = notices.lock().unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(
        notices[0],
        vec![json!({"rewrite": "p=9", "stages": ["pre_get_posts"]}), json!("shop(/)?")]
    );
}

#[tokio::test]
async fn test_on_request_matched_without_request_scope() {
    let registry = HookRegistry::new();
    let bundle = CallbackBundle::builder()
        .on("wp", |_| Ok(Value::Null))
        .build()
        .unwrap();
    let route = Arc::new(Route::new("shop(/)?", bundle, vec![]));

    let ctx = HookContext {
        registry: &registry,
        request: None,
        hook: hooks::PARSE_REQUEST,
    };
    assert_eq!(
        route.on_request_matched(ctx, Some("blog")).await.unwrap(),
        RouteState::Unmatched
    );
    assert_eq!(
        route.on_request_matched(ctx, Some("shop(/)?")).await.unwrap(),
        RouteState::Engaged
    );
    assert_eq!(registry.listener_count("wp").await, 1);
}

#[tokio::test]
async fn test_router_rejects_duplicate_pattern() {
    let router = Router::new(Arc::new(HookRegistry::new()));
    router.add_route("shop(/)?", CallbackBundle::new(), vec![]).await.unwrap();

    let result = router.add_route("shop(/)?", CallbackBundle::new(), vec![]).await;
    assert!(matches!(result, Err(RouteError::RouteAlreadyExists(_))));
}

#[tokio::test]
async fn test_unknown_bundle_key_rejected_at_construction() {
    let result = CallbackBundle::builder()
        .on("the_content", |_| Ok(Value::Null))
        .build();
    assert!(matches!(result, Err(RouteError::UnknownStage(name)) if name == "the_content"));
}
