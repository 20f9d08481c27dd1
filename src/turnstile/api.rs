// Copyright: Metro Conquest organisers
// Removal of the attribution is not allowed

use actix_web::{HttpResponse, Responder, get, post, web};
use itertools::Itertools;
use metroquest::GameCore;
use metroquest::store::Storage;
use metroquest::team::{Team, TeamState};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(index)
        .service(get_graph)
        .service(get_station)
        .service(get_next_stations)
        .service(list_teams)
        .service(get_team)
        .service(save_game);
}

#[derive(Serialize)]
struct TeamView<'a> {
    #[serde(flatten)]
    team: &'a Team,
    state: TeamState,
}

#[get("/")]
async fn index() -> impl Responder {
    HttpResponse::Ok()
        .insert_header(("Content-Type", "text/plain"))
        .body("Metro Conquest turnstile")
}

#[get("/graph")]
async fn get_graph(core: web::Data<Arc<GameCore>>) -> impl Responder {
    match core.metro().await.graph_snapshot() {
        Ok(snapshot) => HttpResponse::Ok()
            .insert_header(("Content-Type", "application/json"))
            .insert_header(("Content-Disposition", "attachment; filename=\"graph.json\""))
            .body(snapshot),
        Err(e) => {
            error!("Could not serialise graph: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[get("/stations/{name}")]
async fn get_station(core: web::Data<Arc<GameCore>>, path: web::Path<String>) -> impl Responder {
    let name = path.into_inner();

    match core.metro().await.find_station(&name) {
        Some(station) => HttpResponse::Ok().json(station),
        None => HttpResponse::NotFound().body(format!("no station named {}", name)),
    }
}

#[get("/stations/{name}/next")]
async fn get_next_stations(core: web::Data<Arc<GameCore>>, path: web::Path<String>) -> impl Responder {
    let name = path.into_inner();

    match core.metro().await.reachable(&name) {
        Some(neighbours) => HttpResponse::Ok().json(neighbours.iter().collect_vec()),
        None => HttpResponse::NotFound().body(format!("no station named {}", name)),
    }
}

#[get("/teams")]
async fn list_teams(core: web::Data<Arc<GameCore>>) -> impl Responder {
    HttpResponse::Ok().json(core.team_names())
}

#[get("/teams/{name}")]
async fn get_team(core: web::Data<Arc<GameCore>>, path: web::Path<String>) -> impl Responder {
    let name = path.into_inner();

    let Some(shared) = core.team(&name) else {
        return HttpResponse::NotFound().body(format!("no team named {}", name));
    };

    let team = shared.lock().await;
    HttpResponse::Ok().json(TeamView {
        team: &team,
        state: team.state(),
    })
}

#[post("/save")]
async fn save_game(core: web::Data<Arc<GameCore>>, storage: web::Data<Arc<Storage>>) -> impl Responder {
    match core.save_all(storage.get_ref().as_ref()).await {
        Ok(()) => HttpResponse::Ok().body("saved"),
        Err(e) => {
            error!("Manual save failed: {}", e);
            HttpResponse::InternalServerError().body(e.to_string())
        }
    }
}
