//! End-to-end checks of the JSON API over a real socket, backed by the
//! in-memory store and a clock pinned to 2026-10-19.

use std::sync::Arc;

use almacen_server::clock::FixedClock;
use almacen_server::db::MemoryStore;
use almacen_server::{serve, AppState};
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpListener;

// ─── Harness ────────────────────────────────────────────────────────────────

struct Api {
    base: String,
    client: Client,
}

impl Api {
    async fn start() -> Self {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let state = Arc::new(AppState::new(
            Arc::new(MemoryStore::new()),
            Arc::new(FixedClock::new(today)),
        ));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, state, std::future::pending()));
        Api {
            base: format!("http://{addr}"),
            client: Client::new(),
        }
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let resp = self.client.get(format!("{}{path}", self.base)).send().await.unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let resp = self
            .client
            .post(format!("{}{path}", self.base))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }

    async fn put(&self, path: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = self.client.put(format!("{}{path}", self.base));
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.send().await.unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }

    async fn seed_catalog(&self) {
        let (status, _) = self
            .post(
                "/producto/crearproducto",
                json!({
                    "nombre": "Leche",
                    "productId": "P-1",
                    "categoria": "Lacteos",
                    "precioCompra": 20.0,
                    "cantidad": 10,
                    "unidad": "l",
                    "valorUmbral": 2,
                    "fechaCaducidad": "2027-01-31"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = self
            .post(
                "/proveedor/crearproveedor",
                json!({
                    "nombreProveedor": "Granja Sol",
                    "producto": "Leche",
                    "categoria": "Lacteos",
                    "precioCompra": 30.0,
                    "numeroContacto": "555-0101",
                    "correo": "sol@granja.test",
                    "Tipo": "Acepta devolucion"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_ok() {
    let api = Api::start().await;
    let (status, body) = api.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn order_to_profit_flow() {
    let api = Api::start().await;
    api.seed_catalog().await;

    let (status, receipt) = api
        .post(
            "/orden/crearorden",
            json!({
                "nombreProducto": "Leche",
                "cantidad": 4,
                "fechaEntrega": "2026-10-25",
                "precioPieza": 25.0
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["orden"]["estado"], "En camino");
    assert_eq!(receipt["orden"]["precioPedido"], 100.0);
    let order_id = receipt["orden"]["ordenId"].as_str().unwrap().to_string();

    let (status, change) = api
        .put(&format!("/orden/ordenes/{order_id}/confirmar"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(change["estado"], "Confirmado");

    let (status, purchase) = api
        .post(
            "/proveedor/crearordenproveedor",
            json!({
                "nombreProducto": "Leche",
                "nombreProveedor": "Granja Sol",
                "cantidad": 2,
                "fechaEntrega": "2026-10-28"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(purchase["estado"], "En espera");
    let purchase_id = purchase["id"].as_str().unwrap().to_string();

    let (status, profit) = api.get("/proveedor/totalProfitMonth").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profit, json!({"totalProfit": 40.0, "revenue": 100.0, "cost": 60.0}));

    let (status, _) = api
        .put(&format!("/proveedor/marcarentregado/{purchase_id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = api
        .put(&format!("/proveedor/marcarentregado/{purchase_id}"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, page) = api.get("/producto/productos").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["productos"][0]["cantidad"], "8 l");
    assert_eq!(page["siguiente"], Value::Null);

    let (status, received) = api
        .post(
            "/proveedor/crearordenproveedor",
            json!({
                "nombreProducto": "Leche",
                "nombreProveedor": "Granja Sol",
                "cantidad": 3,
                "fechaEntrega": "2026-10-28",
                "estado": "Recibida"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, page) = api.get("/producto/productos").await;
    assert_eq!(page["productos"][0]["cantidad"], "11 l");
    let received_id = received["id"].as_str().unwrap().to_string();
    let (status, _) = api
        .put(&format!("/proveedor/ordenesproveedor/{received_id}/devolver"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, page) = api.get("/producto/productos").await;
    assert_eq!(page["productos"][0]["cantidad"], "8 l");

    let (status, page) = api.get("/orden/ordenes?page=1&limit=6").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["ordenes"][0]["cantidad"], "4 l");

    let (status, best) = api.get("/producto/masvendidos?periodo=month&limite=3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(best[0]["nombreProducto"], "Leche");
    assert_eq!(best[0]["stock"], 8);
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let api = Api::start().await;

    let (status, _) = api.get("/orden/ordenes").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    api.seed_catalog().await;
    let (status, body) = api
        .post(
            "/orden/crearorden",
            json!({
                "nombreProducto": "Leche",
                "cantidad": 1,
                "fechaEntrega": "2026-10-19",
                "precioPieza": 25.0
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = api
        .post("/orden/crearorden", json!({"nombreProducto": "Leche"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = api.put("/orden/ordenes/missing/confirmar", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = api.put("/proveedor/marcarentregado/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = api.get("/proveedor/totalProfit?inicio=2026-10-01").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = api.get("/proveedor/totalProfitYearPuntos?anios=21").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = api.get("/producto/productos?cursor=0000-does-not-exist").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, series) = api.get("/proveedor/totalProfitYearPuntos").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(series["labels"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn owner_sessions() {
    let api = Api::start().await;
    let owner = json!({"nombre": "Ana", "correo": "ana@almacen.test", "password": "s3creta"});

    let (status, _) = api.post("/dueno/creardueno", owner.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = api.post("/dueno/creardueno", owner).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = api
        .post("/dueno/login", json!({"correo": "ana@almacen.test", "password": "nope"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, login) = api
        .post("/dueno/login", json!({"correo": "ana@almacen.test", "password": "s3creta"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let token = login["token"].as_str().unwrap();

    let resp = api
        .client
        .get(format!("{}/dueno/perfil", api.base))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let profile: Value = resp.json().await.unwrap();
    assert_eq!(profile, json!({"nombre": "Ana", "correo": "ana@almacen.test"}));

    let (status, body) = api.get("/dueno/perfil").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn stores_round_trip() {
    let api = Api::start().await;
    let (status, _) = api
        .post(
            "/tienda/creartienda",
            json!({
                "nombreTienda": "Centro",
                "ciudad": "Guadalajara",
                "codigoPostal": "44100",
                "direccion": "Av. Juarez 100",
                "telefono": "33-1234-5678",
                "idTienda": "T-01"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, rows) = api.get("/tienda/tiendas").await;
    assert_eq!(rows[0]["ciudad"], "Guadalajara 44100");

    let (status, updated) = api
        .put("/tienda/actualizartienda/T-01", Some(json!({"telefono": "33-0000-0000"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["tienda"]["telefono"], "33-0000-0000");

    let (status, _) = api.get("/tienda/tienda/T-99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
