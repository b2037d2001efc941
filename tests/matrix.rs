#![allow(dead_code)]

use crate::utils::offline_client;
use std::fs;
use unleash::{Context, Variant};

mod utils;

const MATRIX_FILE: &str = "tests/data/rollout_matrix.csv";
const FEATURES_FILE: &str = "tests/data/rollout_matrix.json";

#[test]
fn rollout_matrix() {
    let client = offline_client(FEATURES_FILE).build().unwrap();
    let content = fs::read_to_string(MATRIX_FILE).unwrap();
    let mut lines = content.lines();
    let header = lines.next().unwrap().split(';').collect::<Vec<&str>>();

    let mut errors = Vec::<String>::new();
    for (i, line) in lines.enumerate() {
        let row = line.split(';').collect::<Vec<&str>>();
        let user_id = row[0];
        let ctx = Context::new()
            .user_id(user_id)
            .property("tenant", format!("tenant-{}", (i + 1) % 7).as_str());

        for (col, flag) in header.iter().enumerate().skip(1) {
            let expected = row[col];
            let actual = match *flag {
                "checkout-color" => client.get_variant(flag, &ctx, Variant::disabled()).name,
                _ => client.is_enabled(flag, &ctx, false).to_string(),
            };
            if actual != expected {
                errors.push(format!("flag: {flag}, user: {user_id}, expected: {expected}, actual: {actual}"));
            }
        }
    }
    assert!(errors.is_empty(), "errors: {errors:?}");
}

#[test]
fn rollout_distribution() {
    let client = offline_client(FEATURES_FILE).build().unwrap();

    let enabled = (0..10_000).filter(|i| client.is_enabled("rollout-30", &Context::new().user_id(i.to_string().as_str()), false)).count();
    assert!((2_700..=3_300).contains(&enabled), "enabled: {enabled}");

    let blue = (0..10_000).filter(|i| client.get_variant("checkout-color", &Context::new().user_id(i.to_string().as_str()), Variant::disabled()).name == "blue").count();
    assert!((2_700..=3_300).contains(&blue), "blue: {blue}");
}

#[test]
fn missing_sticky_field_does_not_activate() {
    let client = offline_client(FEATURES_FILE).build().unwrap();

    for i in 0..50 {
        let ctx = Context::new().user_id(i.to_string().as_str());
        assert!(!client.is_enabled("tenant-rollout", &ctx, true));
    }
}
