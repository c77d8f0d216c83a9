//! Rotas da API sob `/api/v1`
//!
//! Rotas públicas: health, login e cadastro. As demais passam pelo
//! middleware de autenticação, que injeta o `CurrentUser`.

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{
    anamnese, appointments, cost_centers, families, health, leads, patients, payments, repasses,
    sessions, users,
};
use crate::middleware::require_auth;
use crate::state::AppState;

pub fn build_router(state: AppState, max_concurrency: usize) -> Router {
    let public = Router::new()
        .route("/health", get(health::check))
        .route("/auth/login", post(users::login))
        .route("/users", post(users::register));

    let protected = Router::new()
        .route("/users/:email", get(users::get_by_email))
        .route(
            "/cost-centers",
            post(cost_centers::create).get(cost_centers::list),
        )
        .route(
            "/cost-centers/:id",
            get(cost_centers::get)
                .put(cost_centers::update)
                .delete(cost_centers::delete),
        )
        .route("/patients", post(patients::create).get(patients::list))
        .route(
            "/patients/:patient_id",
            get(patients::get)
                .put(patients::update)
                .delete(patients::delete),
        )
        .route("/patients/:patient_id/evolutions", get(patients::evolutions))
        .route(
            "/patients/:patient_id/families",
            post(families::create).get(families::list),
        )
        .route(
            "/patients/:patient_id/families/:family_id",
            get(families::get)
                .put(families::update)
                .delete(families::delete),
        )
        .route("/leads", post(leads::create).get(leads::list))
        .route(
            "/leads/:lead_id",
            get(leads::get).put(leads::update).delete(leads::delete),
        )
        .route("/leads/:lead_id/convert", post(leads::convert))
        .route(
            "/anamnese/templates",
            post(anamnese::create_template).get(anamnese::list_templates),
        )
        .route(
            "/anamnese/templates/:template_id",
            get(anamnese::get_template)
                .put(anamnese::update_template)
                .delete(anamnese::delete_template),
        )
        .route(
            "/anamnese/templates/:template_id/fields",
            post(anamnese::create_field).get(anamnese::list_fields),
        )
        .route(
            "/anamnese/templates/:template_id/fields/:field_id",
            put(anamnese::update_field).delete(anamnese::delete_field),
        )
        .route(
            "/anamnese/templates/:template_id/fields/:field_id/options",
            post(anamnese::create_option)
                .get(anamnese::list_options)
                .put(anamnese::replace_options),
        )
        .route(
            "/anamnese/patients",
            post(anamnese::create_patient_anamnese),
        )
        .route(
            "/anamnese/patients/:patient_id",
            get(anamnese::list_patient_anamneses),
        )
        .route(
            "/anamnese/patients/:patient_id/:record_id",
            get(anamnese::get_patient_anamnese),
        )
        .route(
            "/appointments",
            post(appointments::create).get(appointments::list),
        )
        .route(
            "/appointments/:appointment_id",
            get(appointments::get)
                .put(appointments::update)
                .delete(appointments::delete),
        )
        .route("/sessions", get(sessions::list))
        .route("/sessions/:session_id", get(sessions::get))
        .route(
            "/sessions/:session_id/evolutions",
            post(sessions::create_evolution),
        )
        .route(
            "/sessions/:session_id/evolutions/:evolution_id",
            get(sessions::get_evolution),
        )
        .route("/payments", post(payments::create).get(payments::list))
        .route("/payments/:payment_id", get(payments::get))
        .route("/repasses", post(repasses::create).get(repasses::list))
        .route("/repasses/:repasse_id/status", put(repasses::update_status))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api/v1", public.merge(protected))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors)
                .layer(ConcurrencyLimitLayer::new(max_concurrency)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use psygrow_db::repositories::MockLeadRepository;
    use psygrow_db::{init_db_pool, DbConfig, DbError};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::auth::TokenService;

    async fn test_state() -> (TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_db_pool(&DbConfig {
            db_path: dir.path().join("api.db").to_str().unwrap().to_string(),
            max_connections: 2,
        })
        .await
        .unwrap();
        (dir, AppState::new(pool, TokenService::new("segredo-de-teste", 24)))
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn signup(app: &Router, email: &str) -> String {
        let (status, _) = send(
            app,
            "POST",
            "/api/v1/users",
            None,
            Some(json!({"name": "Dra. Ana", "email": email, "password": "senha-segura-1"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(
            app,
            "POST",
            "/api/v1/auth/login",
            None,
            Some(json!({"email": email, "password": "senha-segura-1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    async fn cost_center(app: &Router, token: &str) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/api/v1/cost-centers",
            Some(token),
            Some(json!({
                "name": "Consultório Centro",
                "repasse_model": "professional_pays",
                "repasse_type": "percent",
                "repasse_value": 3000
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    async fn patient(app: &Router, token: &str, cost_center_id: &str, name: &str) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/api/v1/patients",
            Some(token),
            Some(json!({
                "cost_center_id": cost_center_id,
                "full_name": name,
                "birth_date": "1988-07-21"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    async fn appointment(
        app: &Router,
        token: &str,
        patient_id: &str,
        cost_center_id: &str,
        start: &str,
        end: &str,
    ) -> (StatusCode, Value) {
        send(
            app,
            "POST",
            "/api/v1/appointments",
            Some(token),
            Some(json!({
                "patient_id": patient_id,
                "cost_center_id": cost_center_id,
                "service_title": "Psicoterapia individual",
                "start_time": start,
                "end_time": end
            })),
        )
        .await
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let (_dir, state) = test_state().await;
        let app = build_router(state, 16);

        let (status, body) = send(&app, "GET", "/api/v1/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database"], "ok");
        assert_eq!(body["version"], crate::built_info::PKG_VERSION);
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        let (_dir, state) = test_state().await;
        let app = build_router(state, 16);

        let (status, body) = send(&app, "GET", "/api/v1/patients", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());

        let (status, _) = send(&app, "GET", "/api/v1/patients", Some("lixo"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let foreign = TokenService::new("outro-segredo", 24)
            .issue(Uuid::new_v4(), "professional")
            .unwrap();
        let (status, _) = send(&app, "GET", "/api/v1/leads", Some(&foreign), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_registration_and_login_rules() {
        let (_dir, state) = test_state().await;
        let app = build_router(state.clone(), 16);
        let token = signup(&app, "ana@psygrow.com.br").await;

        let (status, body) =
            send(&app, "GET", "/api/v1/users/ana@psygrow.com.br", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["role"], "professional");
        assert!(body.get("password_hash").is_none());
        assert!(body["last_login_at"].is_string());

        let (status, _) =
            send(&app, "GET", "/api/v1/users/outro@psygrow.com.br", Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/users",
            None,
            Some(json!({"name": "Outra Ana", "email": "ana@psygrow.com.br", "password": "12345678"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/auth/login",
            None,
            Some(json!({"email": "ana@psygrow.com.br", "password": "senha-errada"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Usuário ou senha inválidos");

        // E-mail desconhecido responde igual a senha errada
        let (status, unknown) = send(
            &app,
            "POST",
            "/api/v1/auth/login",
            None,
            Some(json!({"email": "ninguem@psygrow.com.br", "password": "senha-errada"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(unknown, body);

        sqlx::query("UPDATE users SET is_active = 0 WHERE email = ?")
            .bind("ana@psygrow.com.br")
            .execute(&state.pool)
            .await
            .unwrap();
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/auth/login",
            None,
            Some(json!({"email": "ana@psygrow.com.br", "password": "senha-segura-1"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Conta inativa");
    }

    #[tokio::test]
    async fn test_validation_errors_have_details() {
        let (_dir, state) = test_state().await;
        let app = build_router(state, 16);
        let token = signup(&app, "ana@psygrow.com.br").await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/cost-centers",
            Some(&token),
            Some(json!({
                "name": "Clínica",
                "repasse_model": "clinic_pays",
                "repasse_type": "percent",
                "repasse_value": 15000
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Dados inválidos");
        assert!(body["details"].is_string());
    }

    #[tokio::test]
    async fn test_cross_tenant_access_is_not_found() {
        let (_dir, state) = test_state().await;
        let app = build_router(state, 16);
        let owner = signup(&app, "ana@psygrow.com.br").await;
        let stranger = signup(&app, "bruno@psygrow.com.br").await;

        let cc = cost_center(&app, &owner).await;
        let patient_id = patient(&app, &owner, &cc, "Carla Souza").await;
        let uri = format!("/api/v1/patients/{}", patient_id);

        let (status, body) = send(&app, "GET", &uri, Some(&stranger), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.get("full_name").is_none());

        let update = json!({"cost_center_id": cc, "full_name": "Invasor", "birth_date": "1990-01-01"});
        let (status, _) = send(&app, "PUT", &uri, Some(&stranger), Some(update)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, "DELETE", &uri, Some(&stranger), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, "GET", &uri, Some(&owner), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["full_name"], "Carla Souza");
        assert_eq!(body["cost_center_name"], "Consultório Centro");

        let (status, _) = send(&app, "GET", "/api/v1/patients/nao-e-uuid", Some(&owner), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "DELETE", &uri, Some(&owner), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_invalid_pagination_falls_back_to_defaults() {
        let (_dir, state) = test_state().await;
        let app = build_router(state, 16);
        let token = signup(&app, "ana@psygrow.com.br").await;
        let cc = cost_center(&app, &token).await;
        for i in 0..12 {
            patient(&app, &token, &cc, &format!("Paciente {:02}", i)).await;
        }

        for query in ["limit=0", "limit=-5", "limit=-5&offset=-1", "limit=10&offset=0"] {
            let uri = format!("/api/v1/patients?{}", query);
            let (status, body) = send(&app, "GET", &uri, Some(&token), None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["limit"], 10);
            assert_eq!(body["offset"], 0);
            assert_eq!(body["total"], 12);
            assert_eq!(body["data"].as_array().unwrap().len(), 10);
            assert_eq!(body["data"][0]["full_name"], "Paciente 00");
        }

        let (_, body) = send(&app, "GET", "/api/v1/patients?name=paciente%2011", Some(&token), None).await;
        assert_eq!(body["total"], 1);
    }

    #[tokio::test]
    async fn test_done_appointment_creates_session() {
        let (_dir, state) = test_state().await;
        let app = build_router(state, 16);
        let token = signup(&app, "ana@psygrow.com.br").await;
        let cc = cost_center(&app, &token).await;
        let patient_id = patient(&app, &token, &cc, "Diego Lima").await;

        let (status, _) = appointment(
            &app,
            &token,
            &patient_id,
            &cc,
            "2024-03-10T15:00:00Z",
            "2024-03-10T14:00:00Z",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (_, body) = send(&app, "GET", "/api/v1/appointments", Some(&token), None).await;
        assert_eq!(body["total"], 0);

        let (status, created) = appointment(
            &app,
            &token,
            &patient_id,
            &cc,
            "2024-03-10T14:00:00Z",
            "2024-03-10T14:50:00Z",
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "scheduled");
        let uri = format!("/api/v1/appointments/{}", created["id"].as_str().unwrap());

        let (status, updated) =
            send(&app, "PUT", &uri, Some(&token), Some(json!({"status": "done"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], "done");

        let sessions_uri = format!("/api/v1/sessions?patient_id={}", patient_id);
        let (status, body) = send(&app, "GET", &sessions_uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        let session = &body["data"][0];
        assert_eq!(session["appointment_id"], created["id"]);
        assert_eq!(session["start_time"], created["start_time"]);
        assert_eq!(session["end_time"], created["end_time"]);
        assert_eq!(session["was_attended"], true);

        let evolution_uri = format!(
            "/api/v1/sessions/{}/evolutions",
            session["id"].as_str().unwrap()
        );
        let (status, _) = send(
            &app,
            "POST",
            &evolution_uri,
            Some(&token),
            Some(json!({"content": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(
            &app,
            "POST",
            &evolution_uri,
            Some(&token),
            Some(json!({"content": "Paciente relatou melhora do sono."})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, evolutions) = send(
            &app,
            "GET",
            &format!("/api/v1/patients/{}/evolutions", patient_id),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(evolutions.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_lead_conversion_flow() {
        let (_dir, state) = test_state().await;
        let app = build_router(state, 16);
        let token = signup(&app, "ana@psygrow.com.br").await;
        let cc = cost_center(&app, &token).await;

        let (status, lead) = send(
            &app,
            "POST",
            "/api/v1/leads",
            Some(&token),
            Some(json!({
                "full_name": "Maria Silva",
                "birth_date": "1990-05-10",
                "phone": "11999990000",
                "contact_date": "2024-02-01T10:00:00Z",
                "origin": "instagram"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(lead["status"], "new");
        let convert_uri = format!("/api/v1/leads/{}/convert", lead["id"].as_str().unwrap());

        let (status, conversion) = send(
            &app,
            "POST",
            &convert_uri,
            Some(&token),
            Some(json!({"cost_center_id": cc})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let patient_uri = format!(
            "/api/v1/patients/{}",
            conversion["patient_id"].as_str().unwrap()
        );
        let (_, created) = send(&app, "GET", &patient_uri, Some(&token), None).await;
        assert_eq!(created["full_name"], "Maria Silva");
        assert_eq!(created["birth_date"], "1990-05-10");
        assert_eq!(created["phone"], "11999990000");

        let lead_uri = format!("/api/v1/leads/{}", lead["id"].as_str().unwrap());
        let (_, converted) = send(&app, "GET", &lead_uri, Some(&token), None).await;
        assert_eq!(converted["status"], "converted");
        assert!(converted["converted_at"].is_string());

        let (status, _) = send(
            &app,
            "POST",
            &convert_uri,
            Some(&token),
            Some(json!({"cost_center_id": cc})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, listed) = send(&app, "GET", "/api/v1/leads?status=converted", Some(&token), None).await;
        assert_eq!(listed["total"], 1);
        let (status, _) = send(&app, "GET", "/api/v1/leads?status=arquivado", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_payment_links_are_atomic() {
        let (_dir, state) = test_state().await;
        let app = build_router(state.clone(), 16);
        let token = signup(&app, "ana@psygrow.com.br").await;
        let cc = cost_center(&app, &token).await;
        let patient_id = patient(&app, &token, &cc, "Elisa Prado").await;

        let mut ids = Vec::new();
        for (start, end) in [
            ("2024-04-01T10:00:00Z", "2024-04-01T10:50:00Z"),
            ("2024-04-08T10:00:00Z", "2024-04-08T10:50:00Z"),
        ] {
            let (_, body) = appointment(&app, &token, &patient_id, &cc, start, end).await;
            ids.push(body["id"].as_str().unwrap().to_string());
        }

        let payment = |appointment_ids: Vec<String>| {
            json!({
                "patient_id": patient_id,
                "cost_center_id": cc,
                "payment_date": "2024-04-10T12:00:00Z",
                "amount": 15000,
                "method": "pix",
                "appointment_ids": appointment_ids
            })
        };

        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/payments",
            Some(&token),
            Some(payment(vec![ids[0].clone(), "nao-e-um-id".to_string()])),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        for table in ["payments", "payment_appointments"] {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&state.pool)
                .await
                .unwrap();
            assert_eq!(count, 0, "{} deveria estar vazia", table);
        }

        let (status, created) = send(
            &app,
            "POST",
            "/api/v1/payments",
            Some(&token),
            Some(payment(ids.clone())),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["amount"], 15000);
        assert_eq!(created["appointment_ids"].as_array().unwrap().len(), 2);

        let (_, listed) = send(&app, "GET", "/api/v1/payments", Some(&token), None).await;
        assert_eq!(listed["total"], 1);
    }

    #[tokio::test]
    async fn test_repasse_status_lifecycle() {
        let (_dir, state) = test_state().await;
        let app = build_router(state, 16);
        let token = signup(&app, "ana@psygrow.com.br").await;
        let cc = cost_center(&app, &token).await;
        let patient_id = patient(&app, &token, &cc, "Fábio Rocha").await;
        let (_, appt) = appointment(
            &app,
            &token,
            &patient_id,
            &cc,
            "2024-05-02T09:00:00Z",
            "2024-05-02T09:50:00Z",
        )
        .await;

        let (status, repasse) = send(
            &app,
            "POST",
            "/api/v1/repasses",
            Some(&token),
            Some(json!({
                "appointment_id": appt["id"],
                "cost_center_id": cc,
                "base_amount": 20000
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(repasse["value"], 6000);
        assert_eq!(repasse["status"], "pending");
        assert_eq!(repasse["does_clinic_receive"], true);
        assert!(repasse["paid_at"].is_null());

        let status_uri = format!("/api/v1/repasses/{}/status", repasse["id"].as_str().unwrap());
        let (status, paid) = send(
            &app,
            "PUT",
            &status_uri,
            Some(&token),
            Some(json!({"status": "paid"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(paid["paid_at"].is_string());

        let (_, pending) = send(&app, "GET", "/api/v1/repasses?status=pending", Some(&token), None).await;
        assert!(pending.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bulk_option_replace() {
        let (_dir, state) = test_state().await;
        let app = build_router(state, 16);
        let token = signup(&app, "ana@psygrow.com.br").await;

        let (_, template) = send(
            &app,
            "POST",
            "/api/v1/anamnese/templates",
            Some(&token),
            Some(json!({"title": "Anamnese adulto"})),
        )
        .await;
        let fields_uri = format!(
            "/api/v1/anamnese/templates/{}/fields",
            template["id"].as_str().unwrap()
        );
        let (status, field) = send(
            &app,
            "POST",
            &fields_uri,
            Some(&token),
            Some(json!({
                "field_number": 1,
                "field_type": "select",
                "field_title": "Estado civil",
                "options": [
                    {"option_value": "Solteiro", "option_order": 1},
                    {"option_value": "Casado", "option_order": 2}
                ]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(field["options"].as_array().unwrap().len(), 2);

        let options_uri = format!("{}/{}/options", fields_uri, field["id"].as_str().unwrap());
        let (status, _) = send(
            &app,
            "PUT",
            &options_uri,
            Some(&token),
            Some(json!({"options": [
                {"option_value": "Divorciado", "option_order": 3},
                {"option_value": "Viúvo", "option_order": 1}
            ]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, options) = send(&app, "GET", &options_uri, Some(&token), None).await;
        let values: Vec<&str> = options
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o["option_value"].as_str().unwrap())
            .collect();
        assert_eq!(values, vec!["Viúvo", "Divorciado"]);
    }

    #[tokio::test]
    async fn test_repository_failure_maps_to_500() {
        let (_dir, mut state) = test_state().await;
        let mut leads = MockLeadRepository::new();
        leads
            .expect_list()
            .returning(|_, _, _| Err(DbError::QueryError("no such table: leads".into())));
        state.repos.leads = Arc::new(leads);

        let token = state.tokens.issue(Uuid::new_v4(), "professional").unwrap();
        let app = build_router(state, 16);

        let (status, body) = send(&app, "GET", "/api/v1/leads", Some(&token), None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Erro interno do servidor");
        assert!(body["details"].as_str().unwrap().contains("no such table"));
    }
}
