use ::common::notification::LISTING_UPDATED;
use serde_json::{Value, json};

use crate::common::TestApp;

const LISTING_ID: &str = "440_76561198012345678_0123456789abcdef0123456789abcdef";

fn save_body(time: &str, metal: f64) -> Value {
    json!({
        "time": time,
        "listing": {
            "id": LISTING_ID,
            "appid": 440,
            "listedAt": 1600000000,
            "bumpedAt": 1600000000,
            "currencies": { "keys": 2, "metal": metal },
            "details": "selling",
            "intent": "sell",
            "item": { "appid": 440, "id": "1234", "defindex": 5021, "quality": { "id": 6 }, "craftable": true },
            "user": { "id": "76561198012345678" }
        }
    })
}

#[tokio::test]
async fn save_and_read_listing() {
    let Some(app) = TestApp::spawn().await else { return };

    let res = app
        .post("/listings", Some(&save_body("2020-09-13T12:26:40Z", 1.5)))
        .await;
    assert_eq!(res.status, 200, "{}", res.text);
    assert_eq!(res.body["saved"], true);
    assert_eq!(res.body["listing"]["firstSeenAt"], "2020-09-13T12:26:40Z");

    let older = app
        .post("/listings", Some(&save_body("2020-09-13T12:00:00Z", 3.0)))
        .await;
    assert_eq!(older.body, json!({ "saved": false }));

    let newer = app
        .post("/listings", Some(&save_body("2020-09-13T13:00:00Z", 3.0)))
        .await;
    assert_eq!(newer.body["listing"]["currenciesHalfScrap"], 54);
    assert_eq!(newer.body["listing"]["firstSeenAt"], "2020-09-13T12:26:40Z");
    assert_eq!(newer.body["listing"]["lastSeenAt"], "2020-09-13T13:00:00Z");

    assert_eq!(app.publisher.destinations(), vec![LISTING_UPDATED, LISTING_UPDATED]);

    let res = app.get(&format!("/listings/id/{LISTING_ID}")).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["sku"], "5021;6");
    assert!(res.body.get("comment").is_none());

    let res = app.get("/listings/sku/5021;6?order=ASC&orderBy=lastCheckedAt").await;
    assert_eq!(res.status, 200, "{}", res.text);
    assert_eq!(res.body["meta"]["itemCount"], 1);
    assert_eq!(res.body["meta"]["itemsPerPage"], 100);
}

#[tokio::test]
async fn missing_listing_is_not_found() {
    let Some(app) = TestApp::spawn().await else { return };

    let res = app.get("/listings/id/440_1").await;
    assert_eq!(res.status, 404);
    assert_eq!(res.body["message"], "Listing does not exist");
}

#[tokio::test]
async fn deleted_flag_and_recheck() {
    let Some(app) = TestApp::spawn().await else { return };
    app.post("/listings", Some(&save_body("2020-09-13T12:26:40Z", 1.5)))
        .await;

    let res = app.post(&format!("/listings/id/{LISTING_ID}/deleted"), None).await;
    assert_eq!(res.body, json!({ "id": LISTING_ID }));
    let res = app.get("/listings?deleted=true").await;
    assert_eq!(res.body["items"][0]["id"], LISTING_ID);

    let res = app.post(&format!("/listings/id/{LISTING_ID}/check"), None).await;
    assert_eq!(res.body, json!({ "enqueued": true }));
    let res = app.post(&format!("/listings/id/{LISTING_ID}/check"), None).await;
    assert_eq!(res.body, json!({ "enqueued": false }));

    let res = app.post("/listings/id/invalid/check", None).await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");
}
