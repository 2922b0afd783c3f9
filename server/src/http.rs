use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use axum::{
    Form, Json, Router,
    extract::{FromRef, Path, State, rejection::PathRejection},
    http::{HeaderName, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Key, PrivateCookieJar};
use handlebars::RenderError;
use products_hr::{EMPLOYEE_NOT_FOUND, EmployeeForm, HrError, HrModule};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::{
    config::AppConfig,
    flash::{self, Flash},
    views::Views,
};

#[derive(Clone)]
pub struct AppState {
    pub hr: HrModule,
    pub views: Arc<Views>,
    pub config: Arc<AppConfig>,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.config.cookie_key.clone()
    }
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    addr: SocketAddr,
}

impl ServeConfig {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::from((host, port)),
        }
    }
}

pub async fn serve(config: ServeConfig, state: AppState) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!(%config.addr, "employee server listening");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let request_id = MakeRequestUuid;
    let header_name = HeaderName::from_static("x-request-id");
    Router::new()
        .route("/", get(list_handler))
        .route("/add", get(add_form_handler).post(create_handler))
        .route("/edit/{id}", get(edit_form_handler).post(update_handler))
        .route("/delete/{id}", post(delete_handler))
        .route("/health", get(health_handler))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header_name.clone(), request_id))
                .layer(PropagateRequestIdLayer::new(header_name))
                .layer(TraceLayer::new_for_http()),
        )
        .with_state(state)
}

async fn list_handler(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> HttpResult<(PrivateCookieJar, Html<String>)> {
    let employees = state.hr.employees().await?;
    let (jar, flashes) = flash::take(jar);
    let page = state.views.index(&employees, &flashes)?;
    Ok((jar, Html(page)))
}

async fn add_form_handler(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> HttpResult<(PrivateCookieJar, Html<String>)> {
    let (jar, flashes) = flash::take(jar);
    let page = state.views.add_form(&EmployeeForm::default(), &flashes)?;
    Ok((jar, Html(page)))
}

async fn create_handler(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Form(form): Form<EmployeeForm>,
) -> HttpResult<Response> {
    match state.hr.add_employee(&form).await {
        Ok(_) => Ok(redirect_home(
            &state,
            jar,
            Flash::success("Employee added successfully!"),
        )),
        Err(err) => {
            log_form_failure(&err);
            let (jar, mut flashes) = flash::take(jar);
            flashes.push(Flash::error(err.to_string()));
            let page = state.views.add_form(&form, &flashes)?;
            Ok((jar, Html(page)).into_response())
        }
    }
}

async fn edit_form_handler(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Path(id): Path<i64>,
) -> HttpResult<Response> {
    match state.hr.employee(id).await {
        Ok(employee) => {
            let (jar, flashes) = flash::take(jar);
            let page = state
                .views
                .edit_form(id, &EmployeeForm::from(&employee), &flashes)?;
            Ok((jar, Html(page)).into_response())
        }
        Err(err @ HrError::NotFound { .. }) => {
            Ok(redirect_home(&state, jar, Flash::error(err.to_string())))
        }
        Err(err) => Err(err.into()),
    }
}

async fn update_handler(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Path(id): Path<i64>,
    Form(form): Form<EmployeeForm>,
) -> HttpResult<Response> {
    match state.hr.update_employee(id, &form).await {
        Ok(_) => Ok(redirect_home(
            &state,
            jar,
            Flash::success("Employee updated successfully!"),
        )),
        Err(err @ HrError::NotFound { .. }) => {
            Ok(redirect_home(&state, jar, Flash::error(err.to_string())))
        }
        Err(err) => {
            log_form_failure(&err);
            let (jar, mut flashes) = flash::take(jar);
            flashes.push(Flash::error(err.to_string()));
            let page = state.views.edit_form(id, &form, &flashes)?;
            Ok((jar, Html(page)).into_response())
        }
    }
}

async fn delete_handler(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    id: Result<Path<i64>, PathRejection>,
) -> Response {
    // An id outside the integer range cannot name a row.
    let Ok(Path(id)) = id else {
        warn!("delete requested for an unparseable id");
        return redirect_home(&state, jar, Flash::error(EMPLOYEE_NOT_FOUND));
    };
    let message = match state.hr.delete_employee(id).await {
        Ok(()) => Flash::success("Employee deleted successfully!"),
        Err(err) => {
            log_form_failure(&err);
            Flash::error(err.to_string())
        }
    };
    redirect_home(&state, jar, message)
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = platform_db::ping(state.hr.pool()).await.is_ok();
    Json(HealthResponse {
        ok: db_ok,
        db_ok,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    db_ok: bool,
    version: &'static str,
}

fn redirect_home(state: &AppState, jar: PrivateCookieJar, message: Flash) -> Response {
    let jar = flash::push(jar, message, state.config.cookie_secure);
    (jar, Redirect::to("/")).into_response()
}

fn log_form_failure(err: &HrError) {
    match err {
        HrError::Storage(source) => error!(error = %source, "employee write failed"),
        other => warn!(error = %other, "employee request rejected"),
    }
}

type HttpResult<T> = Result<T, HttpError>;

#[derive(Debug)]
struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    fn internal(err: anyhow::Error) -> Self {
        error!(error = %err, "request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<HrError> for HttpError {
    fn from(err: HrError) -> Self {
        let status = match err {
            HrError::Validation(_) => StatusCode::BAD_REQUEST,
            HrError::NotFound { .. } => StatusCode::NOT_FOUND,
            HrError::Storage(_) => return Self::internal(err.into()),
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<RenderError> for HttpError {
    fn from(err: RenderError) -> Self {
        Self::internal(err.into())
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        signal(SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    ctrl_c.await;

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, header},
    };
    use http_body_util::BodyExt;
    use migration::{Migrator, MigratorTrait};
    use platform_db::{DatabaseSettings, connect};
    use sea_orm::ConnectionTrait;
    use tower::ServiceExt;

    async fn test_app() -> (Router, HrModule) {
        app_with_schema(true).await
    }

    async fn app_with_schema(migrate: bool) -> (Router, HrModule) {
        let pool = connect(&DatabaseSettings::new("sqlite::memory:"))
            .await
            .unwrap();
        if migrate {
            Migrator::up(&pool, None).await.unwrap();
        }
        let hr = HrModule::new(pool);
        let state = AppState {
            hr: hr.clone(),
            views: Arc::new(Views::new().unwrap()),
            config: Arc::new(AppConfig {
                database: DatabaseSettings::new("sqlite::memory:"),
                cookie_key: Key::generate(),
                cookie_secure: false,
            }),
        };
        (build_router(state), hr)
    }

    fn form_post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn flash_cookie(response: &Response) -> String {
        let raw = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("flash cookie set")
            .to_str()
            .unwrap();
        raw.split(';').next().unwrap().to_string()
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn create_redirects_and_flashes_success() {
        let (app, hr) = test_app().await;
        let response = app
            .clone()
            .oneshot(form_post(
                "/add",
                "name=Ada&position=Engineer&department=R%26D&salary=5200.5",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
        let cookie = flash_cookie(&response);

        let listing = app.oneshot(get("/", Some(&cookie))).await.unwrap();
        assert_eq!(listing.status(), StatusCode::OK);
        let html = body_text(listing).await;
        assert!(html.contains("Employee added successfully!"));
        assert!(html.contains("Ada"));
        assert!(html.contains("R&amp;D"));

        let rows = hr.employees().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].salary, 5200.5);
    }

    #[tokio::test]
    async fn invalid_create_rerenders_form_without_writing() {
        let (app, hr) = test_app().await;
        let response = app
            .oneshot(form_post(
                "/add",
                "name=Ada&position=Engineer&department=Ops&salary=abc",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Salary must be a valid number!"));
        assert!(html.contains(r#"value="Ada""#));
        assert!(hr.employees().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_form_key_is_a_validation_error() {
        let (app, hr) = test_app().await;
        let response = app
            .oneshot(form_post("/add", "name=Ada&position=Engineer&salary=10"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("All fields are required!"));
        assert!(hr.employees().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn edit_form_is_prefilled() {
        let (app, hr) = test_app().await;
        let ada = hr
            .add_employee(&EmployeeForm {
                name: "Ada".into(),
                position: "Engineer".into(),
                department: "Ops".into(),
                salary: "10".into(),
            })
            .await
            .unwrap();
        let response = app
            .oneshot(get(&format!("/edit/{}", ada.id), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains(&format!(r#"action="/edit/{}""#, ada.id)));
        assert!(html.contains(r#"value="Engineer""#));
    }

    #[tokio::test]
    async fn edit_of_missing_employee_redirects_with_error() {
        let (app, _) = test_app().await;
        let response = app.clone().oneshot(get("/edit/77", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let cookie = flash_cookie(&response);
        let html = body_text(app.oneshot(get("/", Some(&cookie))).await.unwrap()).await;
        assert!(html.contains("Employee not found!"));
    }

    #[tokio::test]
    async fn update_overwrites_row_and_redirects() {
        let (app, hr) = test_app().await;
        let ada = hr
            .add_employee(&EmployeeForm {
                name: "Ada".into(),
                position: "Engineer".into(),
                department: "Ops".into(),
                salary: "10".into(),
            })
            .await
            .unwrap();
        let response = app
            .oneshot(form_post(
                &format!("/edit/{}", ada.id),
                "name=Ada+L.&position=Lead&department=Ops&salary=20",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let updated = hr.employee(ada.id).await.unwrap();
        assert_eq!(updated.name, "Ada L.");
        assert_eq!(updated.position, "Lead");
        assert_eq!(updated.salary, 20.0);
    }

    #[tokio::test]
    async fn invalid_update_rerenders_edit_form() {
        let (app, hr) = test_app().await;
        let ada = hr
            .add_employee(&EmployeeForm {
                name: "Ada".into(),
                position: "Engineer".into(),
                department: "Ops".into(),
                salary: "10".into(),
            })
            .await
            .unwrap();
        let response = app
            .oneshot(form_post(
                &format!("/edit/{}", ada.id),
                "name=&position=Lead&department=Ops&salary=20",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("All fields are required!"));
        assert_eq!(hr.employee(ada.id).await.unwrap(), ada);
    }

    #[tokio::test]
    async fn delete_always_redirects() {
        let (app, hr) = test_app().await;
        let ada = hr
            .add_employee(&EmployeeForm {
                name: "Ada".into(),
                position: "Engineer".into(),
                department: "Ops".into(),
                salary: "10".into(),
            })
            .await
            .unwrap();

        let uri = format!("/delete/{}", ada.id);
        let response = app.clone().oneshot(form_post(&uri, "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(hr.employees().await.unwrap().is_empty());

        let response = app.clone().oneshot(form_post(&uri, "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
        let cookie = flash_cookie(&response);
        let html = body_text(app.oneshot(get("/", Some(&cookie))).await.unwrap()).await;
        assert!(html.contains("Employee not found!"));
    }

    #[tokio::test]
    async fn update_of_missing_employee_redirects_with_error() {
        let (app, hr) = test_app().await;
        let ada = hr
            .add_employee(&EmployeeForm {
                name: "Ada".into(),
                position: "Engineer".into(),
                department: "Ops".into(),
                salary: "10".into(),
            })
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(form_post(
                "/edit/77",
                "name=Grace&position=Director&department=Ops&salary=20",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
        let cookie = flash_cookie(&response);
        let html = body_text(app.oneshot(get("/", Some(&cookie))).await.unwrap()).await;
        assert!(html.contains("Employee not found!"));
        assert_eq!(hr.employees().await.unwrap(), vec![ada]);
    }

    #[tokio::test]
    async fn delete_of_out_of_range_ids_still_redirects() {
        let (app, hr) = test_app().await;
        hr.add_employee(&EmployeeForm {
            name: "Ada".into(),
            position: "Engineer".into(),
            department: "Ops".into(),
            salary: "10".into(),
        })
        .await
        .unwrap();

        for uri in ["/delete/3000000000", "/delete/99999999999999999999999"] {
            let response = app.clone().oneshot(form_post(uri, "")).await.unwrap();
            assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
            assert_eq!(location(&response), "/");
            let cookie = flash_cookie(&response);
            let html = body_text(app.clone().oneshot(get("/", Some(&cookie))).await.unwrap()).await;
            assert!(html.contains("Employee not found!"), "{uri}");
        }
        assert_eq!(hr.employees().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn wide_rowids_link_to_their_own_row() {
        let (app, hr) = test_app().await;
        hr.pool()
            .execute_unprepared(
                "INSERT INTO employees (id, name, position, department, salary) \
                 VALUES (4294967297, 'Wide', 'Engineer', 'Ops', 1.0)",
            )
            .await
            .unwrap();

        let html = body_text(app.clone().oneshot(get("/", None)).await.unwrap()).await;
        assert!(html.contains("/edit/4294967297"));
        assert!(!html.contains("/edit/1\""));

        let response = app
            .clone()
            .oneshot(get("/edit/4294967297", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains(r#"value="Wide""#));

        let response = app
            .oneshot(form_post("/delete/4294967297", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(hr.employees().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_storage_failure_flashes_and_redirects() {
        let (app, _) = app_with_schema(false).await;
        let response = app.clone().oneshot(form_post("/delete/1", "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");

        // The list page itself fails without a table, so read the flash from the add form.
        let cookie = flash_cookie(&response);
        let html = body_text(app.oneshot(get("/add", Some(&cookie))).await.unwrap()).await;
        assert!(html.contains("An error occurred: "));
    }

    #[tokio::test]
    async fn health_reports_database_state() {
        let (app, _) = test_app().await;
        let response = app.oneshot(get("/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["db_ok"], serde_json::Value::Bool(true));
    }
}
