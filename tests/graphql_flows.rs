use std::sync::Arc;

use chrono::Utc;
use platform_authz::UsageMetric;
use platform_db::{
    records::{self, ContactFields},
    usage,
};
use sea_orm::ConnectionTrait;
use serde_json::{Value, json};
use suite_tests::{CannedGenerator, TestApp, error_code, error_message};

fn auth_code(response: &async_graphql::Response) -> Option<String> {
    let error = response.errors.first()?;
    match error.extensions.as_ref()?.get("authCode")? {
        async_graphql::Value::String(code) => Some(code.clone()),
        _ => None,
    }
}

const SIGN_UP: &str = r#"
    mutation($email: String!, $password: String!) {
        signUp(email: $email, password: $password, displayName: "Ada") {
            token
            user { id email displayName }
        }
    }
"#;

const SIGN_IN: &str = r#"
    mutation($email: String!, $password: String!) {
        signIn(email: $email, password: $password) { token user { email } }
    }
"#;

#[tokio::test]
async fn sign_up_and_sign_in_report_friendly_errors() {
    let app = TestApp::new().await;

    let weak = app
        .execute(None, SIGN_UP, json!({"email": "ada@example.com", "password": "123"}))
        .await;
    assert_eq!(error_code(&weak).as_deref(), Some("AUTH"));
    assert_eq!(auth_code(&weak).as_deref(), Some("auth/weak-password"));

    let invalid = app
        .execute(None, SIGN_UP, json!({"email": "not-an-email", "password": "secret1"}))
        .await;
    assert_eq!(auth_code(&invalid).as_deref(), Some("auth/invalid-email"));

    let data = app
        .data(None, SIGN_UP, json!({"email": " Ada@Example.com ", "password": "secret1"}))
        .await;
    assert_eq!(data["signUp"]["user"]["email"], "ada@example.com");
    assert_eq!(data["signUp"]["user"]["displayName"], "Ada");
    assert!(!data["signUp"]["token"].as_str().unwrap().is_empty());

    let duplicate = app
        .execute(None, SIGN_UP, json!({"email": "ada@example.com", "password": "secret1"}))
        .await;
    assert_eq!(auth_code(&duplicate).as_deref(), Some("auth/email-already-in-use"));

    let wrong = app
        .execute(None, SIGN_IN, json!({"email": "ada@example.com", "password": "nope!!"}))
        .await;
    assert_eq!(error_message(&wrong), Some("Incorrect password. Please try again."));

    let unknown = app
        .execute(None, SIGN_IN, json!({"email": "bob@example.com", "password": "secret1"}))
        .await;
    assert_eq!(auth_code(&unknown).as_deref(), Some("auth/user-not-found"));

    let signed_in = app
        .data(None, SIGN_IN, json!({"email": "ada@example.com", "password": "secret1"}))
        .await;
    assert_eq!(signed_in["signIn"]["user"]["email"], "ada@example.com");
}

#[tokio::test]
async fn anonymous_requests_are_rejected() {
    let app = TestApp::new().await;
    let response = app.execute(None, "{ me { user { id } } }", json!({})).await;
    assert_eq!(error_code(&response).as_deref(), Some("UNAUTHENTICATED"));
}

#[tokio::test]
async fn new_organizations_start_on_the_free_plan() {
    let app = TestApp::new().await;
    let owner = app.user("owner@example.com").await;
    let org = app.create_organization(&owner, "Acme").await;

    let data = app
        .data(
            Some(&owner),
            r#"query($org: UUID!) {
                me { organizations { id name role } }
                organization(orgId: $org) {
                    organization { name }
                    members { email role }
                    subscription { plan status limits { contacts users } }
                    usage { users contacts }
                }
            }"#,
            json!({"org": org}),
        )
        .await;
    assert_eq!(data["me"]["organizations"][0]["name"], "Acme");
    let detail = &data["organization"];
    assert_eq!(detail["members"][0]["email"], "owner@example.com");
    assert_eq!(detail["members"][0]["role"], "OWNER");
    assert_eq!(detail["subscription"]["plan"], "FREE");
    assert_eq!(detail["subscription"]["limits"]["contacts"], 100);
    assert_eq!(detail["usage"]["users"], 1);
    assert_eq!(detail["usage"]["contacts"], 0);
}

#[tokio::test]
async fn updates_merge_fields_and_deletes_remove_records() {
    let app = TestApp::new().await;
    let owner = app.user("owner@example.com").await;
    let org = app.create_organization(&owner, "Acme").await;

    let created = app
        .data(
            Some(&owner),
            r#"mutation($org: UUID!) {
                createCustomer(orgId: $org, input: {
                    name: "Ada Lovelace", email: "ada@acme.test", company: "ACME", status: "Lead", type: "Enterprise"
                }) { id }
            }"#,
            json!({"org": org}),
        )
        .await;
    let id = created["createCustomer"]["id"].clone();

    let updated = app
        .data(
            Some(&owner),
            r#"mutation($org: UUID!, $id: UUID!) {
                updateCustomer(orgId: $org, id: $id, input: { status: "Active" }) {
                    name email company status type
                }
            }"#,
            json!({"org": org, "id": id}),
        )
        .await;
    assert_eq!(
        updated["updateCustomer"],
        json!({
            "name": "Ada Lovelace",
            "email": "ada@acme.test",
            "company": "ACME",
            "status": "Active",
            "type": "Enterprise"
        })
    );

    let blank = app
        .execute(
            Some(&owner),
            r#"mutation($org: UUID!, $id: UUID!) {
                updateCustomer(orgId: $org, id: $id, input: { name: "  " }) { name }
            }"#,
            json!({"org": org, "id": id}),
        )
        .await;
    assert_eq!(error_code(&blank).as_deref(), Some("INVALID_INPUT"));

    let deleted = app
        .data(
            Some(&owner),
            "mutation($org: UUID!, $id: UUID!) { deleteCustomer(orgId: $org, id: $id) }",
            json!({"org": org, "id": id}),
        )
        .await;
    assert_eq!(deleted["deleteCustomer"], true);

    let missing = app
        .execute(
            Some(&owner),
            "query($org: UUID!, $id: UUID!) { customer(orgId: $org, id: $id) { id } }",
            json!({"org": org, "id": id}),
        )
        .await;
    assert_eq!(error_code(&missing).as_deref(), Some("NOT_FOUND"));
}

#[tokio::test]
async fn records_are_invisible_to_other_organizations() {
    let app = TestApp::new().await;
    let owner = app.user("owner@example.com").await;
    let acme = app.create_organization(&owner, "Acme").await;
    let globex = app.create_organization(&owner, "Globex").await;

    let created = app
        .data(
            Some(&owner),
            r#"mutation($org: UUID!) { createDeal(orgId: $org, input: { title: "Pilot" }) { id } }"#,
            json!({"org": acme}),
        )
        .await;
    let id = created["createDeal"]["id"].clone();

    let listed = app
        .data(
            Some(&owner),
            "query($org: UUID!) { deals(orgId: $org) { id } }",
            json!({"org": globex}),
        )
        .await;
    assert_eq!(listed["deals"], json!([]));

    let cross = app
        .execute(
            Some(&owner),
            "query($org: UUID!, $id: UUID!) { deal(orgId: $org, id: $id) { id } }",
            json!({"org": globex, "id": id}),
        )
        .await;
    assert_eq!(error_code(&cross).as_deref(), Some("NOT_FOUND"));
}

#[tokio::test]
async fn dashboard_numbers_follow_the_records() {
    let app = TestApp::new().await;
    let owner = app.user("owner@example.com").await;
    let org = app.create_organization(&owner, "Acme").await;

    for (title, stage, value, close) in [
        ("Pilot", "proposal", 100.0, None),
        ("Renewal", "Closed Won", 500.0, Some("2024-02-10")),
        ("Upsell", "proposal", 50.0, None),
    ] {
        app.data(
            Some(&owner),
            r#"mutation($org: UUID!, $input: DealInput!) { createDeal(orgId: $org, input: $input) { id } }"#,
            json!({
                "org": org,
                "input": {"title": title, "stage": stage, "value": value, "expectedCloseDate": close}
            }),
        )
        .await;
    }
    for (kind, status, due) in [
        ("Meeting", "Scheduled", "2024-03-04T00:00:00+00:00"),
        ("Meeting", "Scheduled", "2024-03-11T00:00:00+00:00"),
        ("Task", "Open", "2024-03-05T12:00:00+00:00"),
    ] {
        app.data(
            Some(&owner),
            r#"mutation($org: UUID!, $input: ActivityInput!) { createActivity(orgId: $org, input: $input) { id } }"#,
            json!({
                "org": org,
                "input": {"type": kind, "status": status, "subject": "Sync", "dueDate": due}
            }),
        )
        .await;
    }

    let data = app
        .data(
            Some(&owner),
            r#"query($org: UUID!) {
                dashboard(orgId: $org, asOf: "2024-03-04T10:00:00+00:00") {
                    openDeals openDealValue wonDealValue upcomingMeetings openTasks
                    dealsByStage { name value }
                    activitiesByType { name value }
                    wonRevenueByMonth { name value }
                }
            }"#,
            json!({"org": org}),
        )
        .await;
    let dashboard = &data["dashboard"];
    assert_eq!(dashboard["openDeals"], 2);
    assert_eq!(dashboard["openDealValue"], 150.0);
    assert_eq!(dashboard["wonDealValue"], 500.0);
    assert_eq!(dashboard["upcomingMeetings"], 1);
    assert_eq!(dashboard["openTasks"], 1);

    let stages: Vec<&Value> = dashboard["dealsByStage"].as_array().unwrap().iter().collect();
    let total: f64 = stages.iter().map(|p| p["value"].as_f64().unwrap()).sum();
    assert_eq!(total, 3.0);
    assert!(stages.contains(&&json!({"name": "proposal", "value": 2.0})));
    assert!(stages.contains(&&json!({"name": "Closed Won", "value": 1.0})));

    let months = dashboard["wonRevenueByMonth"].as_array().unwrap();
    assert_eq!(months.len(), 6);
    assert_eq!(months.last().unwrap()["name"], "2024-03");
    assert!(months.contains(&json!({"name": "2024-02", "value": 500.0})));
}

#[tokio::test]
async fn viewers_read_but_cannot_write() {
    let app = TestApp::new().await;
    let owner = app.user("owner@example.com").await;
    let viewer = app.user("viewer@example.com").await;
    let stranger = app.user("stranger@example.com").await;
    let org = app.create_organization(&owner, "Acme").await;

    let added = app
        .data(
            Some(&owner),
            r#"mutation($org: UUID!) { addMember(orgId: $org, email: "viewer@example.com", role: VIEWER) { role } }"#,
            json!({"org": org}),
        )
        .await;
    assert_eq!(added["addMember"]["role"], "VIEWER");

    let write = app
        .execute(
            Some(&viewer),
            r#"mutation($org: UUID!) { createLead(orgId: $org, input: { name: "Grace", email: "g@navy.test" }) { id } }"#,
            json!({"org": org}),
        )
        .await;
    assert_eq!(error_code(&write).as_deref(), Some("FORBIDDEN"));

    let billing = app
        .execute(
            Some(&viewer),
            "mutation($org: UUID!) { changePlan(orgId: $org, plan: PRO) { plan } }",
            json!({"org": org}),
        )
        .await;
    assert_eq!(error_code(&billing).as_deref(), Some("FORBIDDEN"));

    let read = app
        .data(
            Some(&viewer),
            "query($org: UUID!) { leads(orgId: $org) { id } }",
            json!({"org": org}),
        )
        .await;
    assert_eq!(read["leads"], json!([]));

    let outside = app
        .execute(
            Some(&stranger),
            "query($org: UUID!) { leads(orgId: $org) { id } }",
            json!({"org": org}),
        )
        .await;
    assert_eq!(error_code(&outside).as_deref(), Some("FORBIDDEN"));
}

#[tokio::test]
async fn the_last_owner_cannot_leave() {
    let app = TestApp::new().await;
    let owner = app.user("owner@example.com").await;
    let org = app.create_organization(&owner, "Acme").await;

    let response = app
        .execute(
            Some(&owner),
            "mutation($org: UUID!, $user: UUID!) { removeMember(orgId: $org, userId: $user) }",
            json!({"org": org, "user": owner.user_id}),
        )
        .await;
    assert_eq!(error_code(&response).as_deref(), Some("INVALID_INPUT"));
}

#[tokio::test]
async fn free_plan_blocks_the_101st_contact() {
    let app = TestApp::new().await;
    let owner = app.user("owner@example.com").await;
    let org = app.create_organization(&owner, "Acme").await;
    usage::increment(&app.db, org, UsageMetric::Contacts, 100, Utc::now())
        .await
        .unwrap();

    let create = r#"mutation($org: UUID!) {
        createCustomer(orgId: $org, input: { name: "One Too Many", email: "extra@example.com" }) { id }
    }"#;
    let blocked = app.execute(Some(&owner), create, json!({"org": org})).await;
    assert_eq!(error_code(&blocked).as_deref(), Some("LIMIT_EXCEEDED"));
    assert_eq!(
        error_message(&blocked),
        Some("contacts limit of 100 reached for this plan")
    );

    app.data(
        Some(&owner),
        "mutation($org: UUID!) { changePlan(orgId: $org, plan: ENTERPRISE) { plan status } }",
        json!({"org": org}),
    )
    .await;
    app.data(Some(&owner), create, json!({"org": org})).await;
    assert_eq!(
        usage::current(&app.db, org, UsageMetric::Contacts).await.unwrap(),
        101
    );
}

const ADD_MEMBER: &str = r#"mutation($org: UUID!, $email: String!) {
    addMember(orgId: $org, email: $email, role: MEMBER) { email }
}"#;

const REMOVE_MEMBER: &str =
    "mutation($org: UUID!, $user: UUID!) { removeMember(orgId: $org, userId: $user) }";

const SEATS: &str = "query($org: UUID!) { usage(orgId: $org) { users } }";

#[tokio::test]
async fn free_plan_blocks_a_third_member() {
    let app = TestApp::new().await;
    let owner = app.user("owner@example.com").await;
    app.user("bob@example.com").await;
    app.user("carol@example.com").await;
    let org = app.create_organization(&owner, "Acme").await;

    app.data(Some(&owner), ADD_MEMBER, json!({"org": org, "email": "bob@example.com"}))
        .await;
    let blocked = app
        .execute(Some(&owner), ADD_MEMBER, json!({"org": org, "email": "carol@example.com"}))
        .await;
    assert_eq!(error_code(&blocked).as_deref(), Some("LIMIT_EXCEEDED"));
    assert_eq!(
        error_message(&blocked),
        Some("users limit of 2 reached for this plan")
    );
    let seats = app.data(Some(&owner), SEATS, json!({"org": org})).await;
    assert_eq!(seats["usage"]["users"], 2);
}

#[tokio::test]
async fn removed_members_free_their_seat() {
    let app = TestApp::new().await;
    let owner = app.user("owner@example.com").await;
    let bob = app.user("bob@example.com").await;
    app.user("carol@example.com").await;
    let org = app.create_organization(&owner, "Acme").await;

    app.data(Some(&owner), ADD_MEMBER, json!({"org": org, "email": "bob@example.com"}))
        .await;
    app.data(
        Some(&owner),
        REMOVE_MEMBER,
        json!({"org": org, "user": bob.user_id}),
    )
    .await;
    let seats = app.data(Some(&owner), SEATS, json!({"org": org})).await;
    assert_eq!(seats["usage"]["users"], 1);

    app.data(Some(&owner), ADD_MEMBER, json!({"org": org, "email": "carol@example.com"}))
        .await;
    let detail = app
        .data(
            Some(&owner),
            "query($org: UUID!) { organization(orgId: $org) { members { email } usage { users } } }",
            json!({"org": org}),
        )
        .await;
    assert_eq!(detail["organization"]["members"].as_array().unwrap().len(), 2);
    assert_eq!(detail["organization"]["usage"]["users"], 2);

    let rejoin = app
        .execute(Some(&owner), ADD_MEMBER, json!({"org": org, "email": "bob@example.com"}))
        .await;
    assert_eq!(error_code(&rejoin).as_deref(), Some("LIMIT_EXCEEDED"));
}

#[tokio::test]
async fn dashboard_counts_every_record_past_the_page_size() {
    let app = TestApp::new().await;
    let owner = app.user("owner@example.com").await;
    let org = app.create_organization(&owner, "Acme").await;

    let total = records::MAX_PAGE as usize + 5;
    for i in 0..total {
        let status = if i % 5 == 0 { "Active" } else { "Prospect" };
        records::create_customer(
            &app.db,
            org,
            ContactFields {
                name: format!("Customer {i}"),
                email: format!("c{i}@example.com"),
                status: Some(status.into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }

    let data = app
        .data(
            Some(&owner),
            r#"query($org: UUID!) {
                dashboard(orgId: $org) { totalCustomers activeCustomers customersByType { value } }
            }"#,
            json!({"org": org}),
        )
        .await;
    let dashboard = &data["dashboard"];
    assert_eq!(dashboard["totalCustomers"], total as u64);
    assert_eq!(dashboard["activeCustomers"], 201);
    let bucketed: f64 = dashboard["customersByType"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["value"].as_f64().unwrap())
        .sum();
    assert_eq!(bucketed, total as f64);
}

/// Make every usage counter write fail while reads keep working.
async fn fail_usage_writes(app: &TestApp) {
    app.db
        .execute_unprepared(
            "CREATE TRIGGER usage_counter_offline BEFORE INSERT ON usage_counter \
             BEGIN SELECT RAISE(ABORT, 'usage counter offline'); END;",
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn a_failed_usage_write_rolls_back_the_contact() {
    let app = TestApp::new().await;
    let owner = app.user("owner@example.com").await;
    let org = app.create_organization(&owner, "Acme").await;
    fail_usage_writes(&app).await;

    let response = app
        .execute(
            Some(&owner),
            r#"mutation($org: UUID!) {
                createLead(orgId: $org, input: { name: "Grace", email: "grace@navy.test" }) { id }
            }"#,
            json!({"org": org}),
        )
        .await;
    assert_eq!(error_code(&response).as_deref(), Some("INTERNAL"));

    let leads = app
        .data(
            Some(&owner),
            "query($org: UUID!) { leads(orgId: $org) { id } }",
            json!({"org": org}),
        )
        .await;
    assert_eq!(leads["leads"], json!([]));
    assert_eq!(
        usage::current(&app.db, org, UsageMetric::Contacts).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn usage_accumulates_per_month_and_in_total() {
    let app = TestApp::new().await;
    let owner = app.user("owner@example.com").await;
    let org = app.create_organization(&owner, "Acme").await;

    for (mutation, email) in [
        ("createCustomer", "a@example.com"),
        ("createCustomer", "b@example.com"),
        ("createLead", "c@example.com"),
    ] {
        let query = format!(
            r#"mutation($org: UUID!, $email: String!) {{ {mutation}(orgId: $org, input: {{ name: "X", email: $email }}) {{ id }} }}"#
        );
        app.data(Some(&owner), &query, json!({"org": org, "email": email}))
            .await;
    }

    let month = usage::month_period(Utc::now());
    let data = app
        .data(
            Some(&owner),
            r#"query($org: UUID!, $month: String!) {
                total: usage(orgId: $org) { contacts users }
                month: usage(orgId: $org, period: $month) { period contacts }
            }"#,
            json!({"org": org, "month": month}),
        )
        .await;
    assert_eq!(data["total"]["contacts"], 3);
    assert_eq!(data["total"]["users"], 1);
    assert_eq!(data["month"]["period"], month.as_str());
    assert_eq!(data["month"]["contacts"], 3);
}

const INSIGHT: &str = r#"mutation($org: UUID!, $kind: InsightKind!) {
    generateInsight(orgId: $org, kind: $kind, context: "Ada, enterprise, renewal due") { kind text tags }
}"#;

#[tokio::test]
async fn insight_failures_surface_a_fixed_message() {
    let app = TestApp::new().await;
    let owner = app.user("owner@example.com").await;
    let org = app.create_organization(&owner, "Acme").await;

    let response = app
        .execute(Some(&owner), INSIGHT, json!({"org": org, "kind": "SUMMARY"}))
        .await;
    assert_eq!(error_code(&response).as_deref(), Some("UNAVAILABLE"));
    assert_eq!(error_message(&response), Some("AI is temporarily unavailable"));
    assert_eq!(
        usage::current(&app.db, org, UsageMetric::AiRequests).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn tag_suggestions_are_split_and_counted() {
    let app =
        TestApp::with_generator(Arc::new(CannedGenerator("vip, renewal , ,enterprise".into())))
            .await;
    let owner = app.user("owner@example.com").await;
    let org = app.create_organization(&owner, "Acme").await;

    let data = app
        .data(Some(&owner), INSIGHT, json!({"org": org, "kind": "TAGS"}))
        .await;
    assert_eq!(
        data["generateInsight"]["tags"],
        json!(["vip", "renewal", "enterprise"])
    );
    assert_eq!(
        usage::current(&app.db, org, UsageMetric::AiRequests).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn generated_text_survives_a_failed_usage_write() {
    let app = TestApp::with_generator(Arc::new(CannedGenerator("Renew early.".into()))).await;
    let owner = app.user("owner@example.com").await;
    let org = app.create_organization(&owner, "Acme").await;
    fail_usage_writes(&app).await;

    let data = app
        .data(Some(&owner), INSIGHT, json!({"org": org, "kind": "SUMMARY"}))
        .await;
    assert_eq!(data["generateInsight"]["text"], "Renew early.");
    assert_eq!(data["generateInsight"]["tags"], json!([]));
}
