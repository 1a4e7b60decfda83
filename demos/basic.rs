//! Minimal weft example: JSON endpoints, a form, a cookie and a template,
//! behind the standard middleware stack.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42?fields=name
//!   curl -X POST http://localhost:3000/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl -X POST http://localhost:3000/login -d 'user=alice'
//!   curl http://localhost:3000/hello/alice
//!   curl -i -X OPTIONS http://localhost:3000/users -H 'origin: https://app.example'

use std::time::Duration;

use handlebars::Handlebars;
use http::StatusCode;
use serde::Deserialize;
use weft::{Context, Router, Server, middleware};

#[derive(Deserialize)]
struct NewUser {
    name: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let mut templates = Handlebars::new();
    templates
        .register_template_string("hello", "<h1>Hello, {{name}}!</h1>")
        .expect("template should parse");

    let app = Router::new()
        .use_middleware(middleware::logger())
        .use_middleware(middleware::recovery())
        .use_middleware(middleware::cors())
        .use_middleware(middleware::rate_limit(Duration::from_millis(10), 100))
        .templates(templates)
        .get("/users/{id}", get_user)
        .post("/users", create_user)
        .post("/login", login)
        .get("/hello/{name}", hello);

    Server::bind("0.0.0.0:3000")
        .serve(app)
        .await
        .expect("server error");
}

// GET /users/{id}?fields=...
fn get_user(c: &mut Context) {
    let id = c.param("id").to_owned();
    let fields = c.default_query("fields", "all").to_owned();
    c.json(StatusCode::OK, &serde_json::json!({ "id": id, "fields": fields }));
}

// POST /users with a JSON or XML body
fn create_user(c: &mut Context) {
    let user: NewUser = match c.should_bind() {
        Ok(user) => user,
        Err(e) => return c.fail(StatusCode::BAD_REQUEST, e.to_string()),
    };
    c.set_header("location", "/users/99");
    c.json(StatusCode::CREATED, &serde_json::json!({ "id": "99", "name": user.name }));
}

// POST /login with an urlencoded form
fn login(c: &mut Context) {
    let user = c.default_post_form("user", "guest");
    c.set_cookie("session", &user, 3600, "/", "", false, true);
    c.string(StatusCode::OK, format_args!("welcome, {user}"));
}

// GET /hello/{name}
fn hello(c: &mut Context) {
    let name = c.param("name").to_owned();
    c.html(StatusCode::OK, "hello", &serde_json::json!({ "name": name }));
}
