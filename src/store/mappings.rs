//! Index mappings for the document store.
//!
//! Exact-match fields are `keyword`, free text is `text`, timestamps are
//! `date`. Filtering in the adapter only ever targets `keyword` fields.

use serde_json::{json, Value};

use crate::models::{Analytics, Media, Post, SocialAccount, User};

/// Field typing for one entity's index.
pub trait DocumentMapping {
    fn mapping() -> Value;
}

impl DocumentMapping for User {
    fn mapping() -> Value {
        json!({
            "mappings": {
                "properties": {
                    "id": { "type": "keyword" },
                    "email": { "type": "keyword" },
                    "password_hash": { "type": "keyword", "index": false },
                    "name": { "type": "text" },
                    "role": { "type": "keyword" },
                    "created_at": { "type": "date" },
                    "updated_at": { "type": "date" }
                }
            }
        })
    }
}

impl DocumentMapping for Post {
    fn mapping() -> Value {
        json!({
            "mappings": {
                "properties": {
                    "id": { "type": "keyword" },
                    "user_id": { "type": "keyword" },
                    "title": { "type": "text" },
                    "content": { "type": "text" },
                    "platforms": { "type": "keyword" },
                    "media_ids": { "type": "keyword" },
                    "links": { "type": "keyword" },
                    "status": { "type": "keyword" },
                    "scheduled_for": { "type": "date" },
                    "published_at": { "type": "date" },
                    "created_at": { "type": "date" },
                    "updated_at": { "type": "date" }
                }
            }
        })
    }
}

impl DocumentMapping for Media {
    fn mapping() -> Value {
        json!({
            "mappings": {
                "properties": {
                    "id": { "type": "keyword" },
                    "user_id": { "type": "keyword" },
                    "post_id": { "type": "keyword" },
                    "url": { "type": "keyword" },
                    "kind": { "type": "keyword" },
                    "file_name": { "type": "keyword" },
                    "size": { "type": "long" },
                    "created_at": { "type": "date" },
                    "updated_at": { "type": "date" }
                }
            }
        })
    }
}

impl DocumentMapping for SocialAccount {
    fn mapping() -> Value {
        json!({
            "mappings": {
                "properties": {
                    "id": { "type": "keyword" },
                    "user_id": { "type": "keyword" },
                    "platform": { "type": "keyword" },
                    "access_token": { "type": "keyword", "index": false },
                    "refresh_token": { "type": "keyword", "index": false },
                    "account_name": { "type": "keyword" },
                    "status": { "type": "keyword" },
                    "created_at": { "type": "date" },
                    "updated_at": { "type": "date" }
                }
            }
        })
    }
}

impl DocumentMapping for Analytics {
    fn mapping() -> Value {
        json!({
            "mappings": {
                "properties": {
                    "id": { "type": "keyword" },
                    "post_id": { "type": "keyword" },
                    "platform": { "type": "keyword" },
                    "likes": { "type": "integer" },
                    "comments": { "type": "integer" },
                    "shares": { "type": "integer" },
                    "reach": { "type": "integer" },
                    "engagement": { "type": "float" },
                    "recorded_at": { "type": "date" },
                    "created_at": { "type": "date" },
                    "updated_at": { "type": "date" }
                }
            }
        })
    }
}
