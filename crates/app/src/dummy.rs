//! Canned notification events for manual testing through `POST /test/:event`.

use serde_json::{json, Value};
use twi_bridge_core::is_cataloged;

const BROADCASTER_ID: &str = "1337";
const BROADCASTER_LOGIN: &str = "cool_user";

/// Sample `event` object for a catalog type, or `None` for anything else.
pub fn sample_event(event_type: &str) -> Option<Value> {
    if !is_cataloged(event_type) {
        return None;
    }

    let event = match event_type {
        "channel.subscribe" => json!({
            "user_id": "1234",
            "user_login": "cool_user",
            "user_name": "Cool_User",
            "broadcaster_user_id": BROADCASTER_ID,
            "broadcaster_user_login": BROADCASTER_LOGIN,
            "broadcaster_user_name": "Cooler_User",
            "tier": "1000",
            "is_gift": false
        }),
        "channel.subscription.gift" => json!({
            "user_id": "1234",
            "user_login": "cool_user",
            "user_name": "Cool_User",
            "broadcaster_user_id": BROADCASTER_ID,
            "broadcaster_user_login": BROADCASTER_LOGIN,
            "broadcaster_user_name": "Cooler_User",
            "total": 2,
            "tier": "1000",
            "cumulative_total": 284,
            "is_anonymous": false
        }),
        "channel.channel_points_custom_reward_redemption.add" => json!({
            "id": "17fa2df1-ad76-4804-bfa5-a40ef63efe63",
            "broadcaster_user_id": BROADCASTER_ID,
            "broadcaster_user_login": BROADCASTER_LOGIN,
            "broadcaster_user_name": "Cool_User",
            "user_id": "9001",
            "user_login": "cooler_user",
            "user_name": "Cooler_User",
            "user_input": "pogchamp",
            "status": "unfulfilled",
            "reward": {
                "id": "92af127c-7326-4483-a52b-b0da0be61c01",
                "title": "title",
                "cost": 100,
                "prompt": "reward prompt"
            },
            "redeemed_at": "2020-07-15T17:16:03.17106713Z"
        }),
        "channel.cheer" => json!({
            "is_anonymous": false,
            "user_id": "1234",
            "user_login": "cool_user",
            "user_name": "Cool_User",
            "broadcaster_user_id": BROADCASTER_ID,
            "broadcaster_user_login": BROADCASTER_LOGIN,
            "broadcaster_user_name": "Cooler_User",
            "message": "pogchamp",
            "bits": 1000
        }),
        "channel.raid" => json!({
            "from_broadcaster_user_id": "1234",
            "from_broadcaster_user_login": "cool_user",
            "from_broadcaster_user_name": "Cool_User",
            "to_broadcaster_user_id": BROADCASTER_ID,
            "to_broadcaster_user_login": BROADCASTER_LOGIN,
            "to_broadcaster_user_name": "Cooler_User",
            "viewers": 9001
        }),
        "channel.hype_train.begin" => json!({
            "id": "1b0AsbInCHZW2SQFQkCzqN07Ib2",
            "broadcaster_user_id": BROADCASTER_ID,
            "broadcaster_user_login": BROADCASTER_LOGIN,
            "broadcaster_user_name": "Cool_User",
            "total": 137,
            "progress": 137,
            "goal": 500,
            "level": 2,
            "top_contributions": [
                { "user_id": "123", "user_login": "pogchamp", "user_name": "PogChamp", "type": "bits", "total": 50 }
            ],
            "last_contribution": { "user_id": "123", "user_login": "pogchamp", "user_name": "PogChamp", "type": "bits", "total": 50 },
            "started_at": "2020-07-15T17:16:03.17106713Z",
            "expires_at": "2020-07-15T17:16:11.17106713Z"
        }),
        "channel.hype_train.progress" => json!({
            "id": "1b0AsbInCHZW2SQFQkCzqN07Ib2",
            "broadcaster_user_id": BROADCASTER_ID,
            "broadcaster_user_login": BROADCASTER_LOGIN,
            "broadcaster_user_name": "Cool_User",
            "level": 2,
            "total": 700,
            "progress": 200,
            "goal": 1000,
            "started_at": "2020-07-15T17:16:03.17106713Z",
            "expires_at": "2020-07-15T17:16:11.17106713Z"
        }),
        "channel.hype_train.end" => json!({
            "id": "1b0AsbInCHZW2SQFQkCzqN07Ib2",
            "broadcaster_user_id": BROADCASTER_ID,
            "broadcaster_user_login": BROADCASTER_LOGIN,
            "broadcaster_user_name": "Cool_User",
            "level": 2,
            "total": 137,
            "started_at": "2020-07-15T17:16:03.17106713Z",
            "ended_at": "2020-07-15T17:16:11.17106713Z",
            "cooldown_ends_at": "2020-07-15T18:16:11.17106713Z"
        }),
        "stream.online" => json!({
            "id": "9001",
            "broadcaster_user_id": BROADCASTER_ID,
            "broadcaster_user_login": BROADCASTER_LOGIN,
            "broadcaster_user_name": "Cool_User",
            "type": "live",
            "started_at": "2020-10-11T10:11:12.123Z"
        }),
        "stream.offline" => json!({
            "broadcaster_user_id": BROADCASTER_ID,
            "broadcaster_user_login": BROADCASTER_LOGIN,
            "broadcaster_user_name": "Cool_User"
        }),
        _ => json!({ "broadcaster_user_id": BROADCASTER_ID }),
    };

    Some(event)
}
