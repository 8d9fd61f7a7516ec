pub mod collect;
pub mod favorites;

pub use collect::*;
pub use favorites::*;

use crate::models::ErrorResponse;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Build, Request, Rocket};

fn invalid_body(message: String) -> (Status, Json<ErrorResponse>) {
    (
        Status::BadRequest,
        Json(ErrorResponse {
            error: "validation_error".to_string(),
            message,
        }),
    )
}

#[catch(400)]
pub fn bad_request(req: &Request) -> (Status, Json<ErrorResponse>) {
    invalid_body(format!("{} {}: request body is not valid JSON", req.method(), req.uri()))
}

// Well-formed JSON of the wrong shape is still a client input error.
#[catch(422)]
pub fn unprocessable(req: &Request) -> (Status, Json<ErrorResponse>) {
    invalid_body(format!("{} {}: request body has the wrong shape", req.method(), req.uri()))
}

pub fn mount(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .register("/", catchers![bad_request, unprocessable])
        .mount("/collect", routes![collect_shorts, collect_popular])
        .mount(
            "/favorites",
            routes![
                list_favorites,
                add_favorite,
                remove_favorite,
                refresh_favorites,
                get_favorite_history
            ],
        )
}
