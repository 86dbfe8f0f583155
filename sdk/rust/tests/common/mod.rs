#![allow(dead_code)]
use std::{collections::HashMap, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct Person {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(int32, tag = "2")]
    pub age: i32,
    #[prost(string, tag = "3")]
    pub address: String,
    #[prost(map = "string, message", tag = "10")]
    pub children: HashMap<String, Person>,
}

pub fn person(name: &str, age: i32) -> Person {
    Person {
        name: name.to_owned(),
        age,
        address: "140 New Montgomery St".to_owned(),
        children: HashMap::new(),
    }
}

pub fn derek() -> Person {
    let mut me = person("derek", 22);
    me.children.insert("sam".to_owned(), person("sam", 19));
    me.children.insert("meg".to_owned(), person("meg", 17));
    me
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Greeting {
    #[prost(string, tag = "1")]
    pub text: String,
}

pub fn init_tracing() {
    use tracing_subscriber::{filter::Directive, EnvFilter};
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(Directive::from_str("info").expect("valid directive"))
                .add_directive(Directive::from_str("encoded_mq_sdk=debug").expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
