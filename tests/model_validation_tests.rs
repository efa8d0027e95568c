use menu_catalog::models::{
    NewCategory, NewProduct, NewUser, PageParams, ProductPatch, PublicUser, Role, User, UserPatch,
    normalize_roles, validate_password,
};
use validator::Validate;

fn product() -> NewProduct {
    NewProduct {
        name: "Torta de Chocolate".to_string(),
        description: "Rich chocolate cake".to_string(),
        category_id: "60d5ec49f87d2e5a2c9c1234".to_string(),
        tags: vec!["dessert".to_string()],
        price: 19.99,
        image: "https://example.com/cake.jpg".to_string(),
    }
}

fn failing_fields<T: Validate>(value: &T) -> Vec<String> {
    let mut fields: Vec<String> = value
        .validate()
        .err()
        .map(|errors| {
            errors
                .field_errors()
                .keys()
                .map(|field| field.to_string())
                .collect()
        })
        .unwrap_or_default();
    fields.sort();
    fields
}

#[test]
fn test_category_name_bounds_count_characters() {
    let mut category = NewCategory {
        name: "ñ".repeat(100),
        image: "https://example.com/c.jpg".to_string(),
    };
    assert!(category.validate().is_ok());

    category.name = "ñ".repeat(101);
    assert_eq!(failing_fields(&category), ["name"]);

    category.name = String::new();
    assert_eq!(failing_fields(&category), ["name"]);
}

#[test]
fn test_product_price_must_be_positive() {
    let mut cheap = product();
    cheap.price = 0.01;
    assert!(cheap.validate().is_ok());

    for price in [0.0, -1.0] {
        let mut invalid = product();
        invalid.price = price;
        assert_eq!(failing_fields(&invalid), ["price"], "{price}");
    }
}

#[test]
fn test_product_tags_bounds() {
    let mut none = product();
    none.tags = Vec::new();
    assert_eq!(failing_fields(&none), ["tags"]);

    let mut ten = product();
    ten.tags = (0..10).map(|n| format!("tag{n}")).collect();
    assert!(ten.validate().is_ok());

    let mut eleven = product();
    eleven.tags = (0..11).map(|n| format!("tag{n}")).collect();
    assert_eq!(failing_fields(&eleven), ["tags"]);

    let mut blank = product();
    blank.tags = vec!["ok".to_string(), "  ".to_string()];
    assert_eq!(failing_fields(&blank), ["tags"]);
}

#[test]
fn test_product_patch_only_validates_present_fields() {
    assert!(ProductPatch::default().validate().is_ok());

    let patch = ProductPatch {
        price: Some(0.0),
        category_id: Some("xyz".to_string()),
        ..ProductPatch::default()
    };
    assert_eq!(failing_fields(&patch), ["category_id", "price"]);
}

#[test]
fn test_password_rules() {
    assert!(validate_password("Secret123!").is_ok());
    assert!(validate_password("Abcdefg1:").is_ok());

    for weak in [
        "Sh0rt!",
        "alllower123!",
        "ALLUPPER123!",
        "NoDigits!!",
        "NoSpecial123",
    ] {
        assert!(validate_password(weak).is_err(), "{weak}");
    }

    let message = validate_password("abc").unwrap_err().message.unwrap();
    assert!(message.contains("an uppercase letter"));
    assert!(message.contains("a digit"));
}

#[test]
fn test_new_user_confirm_password_must_match() {
    let user = NewUser {
        username: "maria".to_string(),
        email: "maria@example.com".to_string(),
        password: "Secret123!".to_string(),
        confirm_password: "Secret123?".to_string(),
        avatar: None,
    };
    assert_eq!(failing_fields(&user), ["confirm_password"]);
}

#[test]
fn test_user_patch_roles_must_not_be_empty() {
    let patch = UserPatch {
        roles: Some(Vec::new()),
        ..UserPatch::default()
    };
    assert_eq!(failing_fields(&patch), ["roles"]);
}

#[test]
fn test_page_size_bounds() {
    let valid = PageParams {
        page: Some(1),
        page_size: Some(100),
    };
    assert!(valid.validate().is_ok());

    let too_big = PageParams {
        page: Some(1),
        page_size: Some(101),
    };
    assert_eq!(failing_fields(&too_big), ["page_size"]);

    let zero_page = PageParams {
        page: Some(0),
        page_size: None,
    };
    assert_eq!(failing_fields(&zero_page), ["page"]);
}

#[test]
fn test_roles_serialize_in_kebab_case_and_collapse() {
    let roles = normalize_roles(vec![Role::SuperAdmin, Role::User, Role::SuperAdmin]);
    assert_eq!(roles, vec![Role::User, Role::SuperAdmin]);
    assert_eq!(
        serde_json::to_string(&roles).unwrap(),
        r#"["user","super-admin"]"#
    );
}

#[test]
fn test_public_user_drops_secrets() {
    let user: User = serde_json::from_value(serde_json::json!({
        "id": "60d5ec49f87d2e5a2c9c1234",
        "username": "maria",
        "email": "maria@example.com",
        "hashed_password": "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA",
        "roles": ["user"],
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z",
        "reset_tokens": ["abc"]
    }))
    .unwrap();

    let json = serde_json::to_value(PublicUser::from(user)).unwrap();
    assert!(json.get("hashed_password").is_none());
    assert!(json.get("reset_tokens").is_none());
    assert!(json.get("google_info").is_none());
    assert_eq!(json["roles"], serde_json::json!(["user"]));
}
