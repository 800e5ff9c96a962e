//! End-to-end calls against a real server. Each test creates its own schema and builds
//! a routing table from it; all tests return early when `DATABASE_URL` is not set.

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use routine_api::{case::to_kebab_case, routine_routes, AppState, RoutineOptions, SynthesisHooks};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tower::ServiceExt;

struct Fixture {
    pool: PgPool,
    schema: String,
    prefix: String,
    app: Router,
}

impl Fixture {
    /// `{s}` in `ddl` is replaced by the fixture schema.
    async fn new(ddl: &str) -> Option<Fixture> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping");
            return None;
        };
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(&url)
            .await
            .expect("connect");
        let schema = format!("routine_api_{}", uuid::Uuid::new_v4().simple());
        let script = format!("create schema {schema};\n{}", ddl.replace("{s}", &schema));
        sqlx::raw_sql(&script).execute(&pool).await.expect("fixture ddl");

        let options = RoutineOptions {
            include_schemas: vec![schema.clone()],
            ..Default::default()
        };
        let state = AppState::build(pool.clone(), options, SynthesisHooks::default())
            .await
            .expect("catalog load");
        Some(Fixture {
            prefix: format!("/api/{}", to_kebab_case(&schema)),
            app: routine_routes(state),
            pool,
            schema,
        })
    }

    fn url(&self, routine: &str) -> String {
        format!("{}/{}/", self.prefix, to_kebab_case(routine))
    }

    async fn call(&self, request: Request<Body>) -> (StatusCode, String) {
        let response: Response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn post(&self, routine: &str, body: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(self.url(routine))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.call(request).await
    }

    async fn get(&self, uri: &str) -> (StatusCode, String) {
        self.call(Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    /// Statements still running in this schema, other than our own.
    async fn active_statements(&self, routine: &str) -> i64 {
        sqlx::query_scalar(
            "select count(*) from pg_stat_activity \
             where state = 'active' and pid <> pg_backend_pid() and query like $1",
        )
        .bind(format!("%{}%{}%", self.schema, routine))
        .fetch_one(&self.pool)
        .await
        .unwrap()
    }

    async fn wait_until_idle(&self, routine: &str) -> i64 {
        let mut active = self.active_statements(routine).await;
        for _ in 0..20 {
            if active == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
            active = self.active_statements(routine).await;
        }
        active
    }

    async fn drop_schema(self) {
        let sql = format!("drop schema {} cascade", self.schema);
        sqlx::raw_sql(&sql).execute(&self.pool).await.unwrap();
    }
}

#[tokio::test]
async fn overloads_resolve_by_supplied_names() {
    let Some(fx) = Fixture::new(
        r#"
        create function {s}.calc() returns text language sql as $$ select 'none' $$;
        create function {s}.calc(i integer) returns text language sql as $$ select 'i=' || i $$;
        create function {s}.calc(i integer, j integer) returns text language sql as $$ select 'sum=' || (i + j) $$;
        create function {s}.calc(x boolean) returns text language sql as $$ select 'x=' || x $$;
        comment on function {s}.calc() is 'HTTP POST';
        comment on function {s}.calc(integer) is 'HTTP POST';
        comment on function {s}.calc(integer, integer) is 'HTTP POST';
        comment on function {s}.calc(boolean) is 'HTTP POST';
        "#,
    )
    .await
    else {
        return;
    };

    assert_eq!(fx.post("calc", "{}").await, (StatusCode::OK, "none".into()));
    assert_eq!(fx.post("calc", r#"{"i":1}"#).await, (StatusCode::OK, "i=1".into()));
    assert_eq!(fx.post("calc", r#"{"i":"2","j":3}"#).await, (StatusCode::OK, "sum=5".into()));
    assert_eq!(fx.post("calc", r#"{"x":true}"#).await, (StatusCode::OK, "x=true".into()));
    assert_eq!(fx.post("calc", r#"{"i":1,"x":true}"#).await.0, StatusCode::NOT_FOUND);
    fx.drop_schema().await;
}

#[tokio::test]
async fn strict_routine_skips_null_calls() {
    let Some(fx) = Fixture::new(
        r#"
        create function {s}.bump(i integer) returns integer language sql strict as $$ select i + 1 $$;
        comment on function {s}.bump(integer) is 'HTTP POST';
        "#,
    )
    .await
    else {
        return;
    };

    assert_eq!(fx.post("bump", r#"{"i":null}"#).await.0, StatusCode::NO_CONTENT);
    assert_eq!(fx.post("bump", r#"{"i":41}"#).await, (StatusCode::OK, "42".into()));
    fx.drop_schema().await;
}

#[tokio::test]
async fn repeated_query_keys_and_path_override() {
    let Some(fx) = Fixture::new(
        r#"
        create function {s}.get_items(a integer[]) returns integer[] language sql as $$ select a $$;
        create function {s}.get_report() returns text language sql as $$ select 'report' $$;
        comment on function {s}.get_items(integer[]) is 'HTTP';
        comment on function {s}.get_report() is E'HTTP GET\nPATH new-path';
        "#,
    )
    .await
    else {
        return;
    };

    let url = format!("{}?a=1&a=&a=3", fx.url("get_items"));
    assert_eq!(fx.get(&url).await, (StatusCode::OK, "[1,null,3]".into()));
    assert_eq!(fx.get("/new-path").await, (StatusCode::OK, "report".into()));
    assert_eq!(fx.get(&fx.url("get_report")).await.0, StatusCode::NOT_FOUND);
    fx.drop_schema().await;
}

#[tokio::test]
async fn numeric_results_keep_every_digit() {
    let Some(fx) = Fixture::new(
        r#"
        create function {s}.get_big() returns table(v numeric, w numeric[]) language sql as
            $$ select 123456789012345678901234567890.125::numeric, array[0.10000000000000000001, null]::numeric[] $$;
        comment on function {s}.get_big() is 'HTTP';
        "#,
    )
    .await
    else {
        return;
    };

    assert_eq!(
        fx.get(&fx.url("get_big")).await,
        (
            StatusCode::OK,
            r#"[{"v":123456789012345678901234567890.125,"w":[0.10000000000000000001,null]}]"#.into()
        )
    );
    fx.drop_schema().await;
}

#[tokio::test]
async fn procedure_out_values_are_decoded() {
    let Some(fx) = Fixture::new(
        r#"
        create type {s}.mood as enum ('ok', 'sad');
        create procedure {s}.double_it(inout total numeric, inout note text) language plpgsql as
            $$ begin total := total * 2; note := note || '!'; end $$;
        create procedure {s}.misc(out m {s}.mood, out d interval, out n inet, out ts timestamptz) language plpgsql as
            $$ begin m := 'ok'; d := '1 day 2 hours'; n := '10.0.0.1/8'; ts := '2024-01-02 01:04:05+00'; end $$;
        comment on procedure {s}.double_it(numeric, text) is 'HTTP POST';
        comment on procedure {s}.misc is 'HTTP POST';
        "#,
    )
    .await
    else {
        return;
    };

    let (status, body) = fx.post("double_it", r#"{"total":21.5,"note":"hi"}"#).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["total"].as_f64(), Some(43.0));
    assert_eq!(json["note"], "hi!");

    let (status, body) = fx.post("misc", "{}").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "m": "ok",
            "d": "1 day 02:00:00",
            "n": "10.0.0.1/8",
            "ts": "2024-01-02T01:04:05+00:00"
        })
    );
    fx.drop_schema().await;
}

#[tokio::test]
async fn timestamps_are_iso_8601() {
    let Some(fx) = Fixture::new(
        r#"
        create function {s}.get_when() returns table(at timestamptz, local timestamp) language sql as
            $$ select '2024-01-02 01:04:05+00'::timestamptz, '2024-01-02 01:04:05'::timestamp $$;
        comment on function {s}.get_when() is 'HTTP';
        "#,
    )
    .await
    else {
        return;
    };

    let (status, body) = fx.get(&fx.url("get_when")).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    let at = chrono::DateTime::parse_from_rfc3339(json[0]["at"].as_str().unwrap()).unwrap();
    assert_eq!(at.with_timezone(&chrono::Utc).to_rfc3339(), "2024-01-02T01:04:05+00:00");
    assert_eq!(json[0]["local"], "2024-01-02T01:04:05");
    fx.drop_schema().await;
}

#[tokio::test]
async fn timeout_cancels_the_statement() {
    let Some(fx) = Fixture::new(
        r#"
        create function {s}.get_slow() returns text language plpgsql as
            $$ begin perform pg_sleep(6); return 'done'; end $$;
        comment on function {s}.get_slow() is E'HTTP GET\nTIMEOUT 1';
        "#,
    )
    .await
    else {
        return;
    };

    let (status, body) = fx.get(&fx.url("get_slow")).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT, "{body}");
    assert_eq!(fx.wait_until_idle("get_slow").await, 0);
    fx.drop_schema().await;
}

#[tokio::test]
async fn abandoned_request_cancels_the_statement() {
    let Some(fx) = Fixture::new(
        r#"
        create function {s}.get_slow() returns text language plpgsql as
            $$ begin perform pg_sleep(6); return 'done'; end $$;
        comment on function {s}.get_slow() is 'HTTP GET';
        "#,
    )
    .await
    else {
        return;
    };

    let request = Request::builder().uri(fx.url("get_slow")).body(Body::empty()).unwrap();
    let abandoned = tokio::time::timeout(Duration::from_millis(700), fx.app.clone().oneshot(request)).await;
    assert!(abandoned.is_err(), "request should still be running");
    assert_eq!(fx.wait_until_idle("get_slow").await, 0);
    fx.drop_schema().await;
}
