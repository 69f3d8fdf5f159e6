#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use application::{MemoryStore, SystemClock};
use chrono::Utc;
use config::{AppConfig, StorageBackend};
use domain::{Pet, PetId, User, UserId};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::oneshot, time::sleep};
use uuid::Uuid;
use web_api::{router, AppState};

/// 在随机端口上运行的完整服务，数据放在内存存储里
pub struct TestApp {
    pub addr: std::net::SocketAddr,
    pub client: Client,
    pub store: MemoryStore,
    pub state: AppState,
    shutdown: Option<oneshot::Sender<()>>,
}

pub struct TestUser {
    pub id: UserId,
    pub token: String,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let mut config = AppConfig::default();
        config.storage.backend = StorageBackend::Memory;

        let store = MemoryStore::new();
        let state = AppState::build(store.repositories(), &config, Arc::new(SystemClock));
        let app = router(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // allow server to start
        sleep(Duration::from_millis(50)).await;

        Self {
            addr,
            client: Client::new(),
            store,
            state,
            shutdown: Some(shutdown_tx),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}/api/v1{}", self.addr, path)
    }

    pub fn ws_url(&self, token: &str) -> String {
        format!("ws://{}/api/v1/ws?token={}", self.addr, token)
    }

    pub async fn user(&self, name: &str) -> TestUser {
        let user = User::register(UserId::generate(), name, Utc::now()).expect("user");
        let id = user.id;
        self.store.insert_user(user).await;
        let token = self
            .state
            .jwt_service
            .generate_token(Uuid::from(id))
            .expect("token");
        TestUser { id, token }
    }

    pub async fn pet(&self, owner: &TestUser, name: &str) -> PetId {
        let pet = Pet::new(PetId::generate(), owner.id, name, "dog", Utc::now()).expect("pet");
        let id = pet.id;
        self.store.insert_pet(pet).await;
        id
    }

    pub fn get(&self, user: &TestUser, path: &str) -> RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(&user.token)
    }

    pub fn post(&self, user: &TestUser, path: &str, body: Value) -> RequestBuilder {
        self.client
            .post(self.url(path))
            .bearer_auth(&user.token)
            .json(&body)
    }

    pub fn put(&self, user: &TestUser, path: &str, body: Value) -> RequestBuilder {
        self.client
            .put(self.url(path))
            .bearer_auth(&user.token)
            .json(&body)
    }

    pub fn delete(&self, user: &TestUser, path: &str) -> RequestBuilder {
        self.client.delete(self.url(path)).bearer_auth(&user.token)
    }

    /// 走完整的兴趣 → 接受流程，返回聊天 id
    pub async fn matched_pair(&self) -> MatchedPair {
        let alice = self.user("alice").await;
        let bob = self.user("bob").await;
        let rex = self.pet(&alice, "Rex").await;
        let luna = self.pet(&bob, "Luna").await;

        let interest = self
            .post(
                &alice,
                "/interests",
                json!({ "fromPetId": rex, "targetPetId": luna }),
            )
            .send()
            .await
            .expect("send interest");
        let interest = json_body(interest).await;

        let resolution = self
            .put(
                &bob,
                &format!("/interests/{}", interest["id"].as_str().expect("interest id")),
                json!({ "targetPetId": luna, "action": "accepted" }),
            )
            .send()
            .await
            .expect("resolve interest");
        let resolution = json_body(resolution).await;
        let chat_id = resolution["chatId"]
            .as_str()
            .expect("chat id")
            .parse::<Uuid>()
            .expect("uuid");

        MatchedPair {
            alice,
            bob,
            rex,
            luna,
            chat_id,
        }
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

pub struct MatchedPair {
    pub alice: TestUser,
    pub bob: TestUser,
    pub rex: PetId,
    pub luna: PetId,
    pub chat_id: Uuid,
}

pub async fn json_body(response: Response) -> Value {
    response.json::<Value>().await.expect("json body")
}
