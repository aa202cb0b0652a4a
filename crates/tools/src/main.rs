mod args;

use std::rc::Rc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use foundation::bounds::LatLngBounds;
use gateway::{GatewayConfig, HttpGateway};
use layers::lod::DisplayMode;
use layers::map::{MapOp, MarkerSpec, RecordingMap};
use layers::{MarkerLayer, Viewport, ViewportController};
use runtime::Frame;
use streaming::protocol::PointFilter;
use territory::{AddMode, AssignLeadsSession, TerritoryId, TerritoryPanel};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "leadmap")]
#[command(about = "Inspect and edit map leads and sales territories")]
struct Cli {
    /// Service base URL; overrides LEADMAP_URL.
    #[arg(long, global = true)]
    url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load the markers a map settled on this viewport would show.
    View {
        /// south,west,north,east
        #[arg(long, value_parser = args::parse_bounds, allow_hyphen_values = true)]
        bounds: LatLngBounds,
        #[arg(long)]
        zoom: f64,
        /// e.g. `status=2` or `knocks>=3`; repeatable.
        #[arg(long = "filter", value_parser = args::parse_filter)]
        filters: Vec<PointFilter>,
    },
    /// Per-assignee lead counts inside a polygon.
    Stats {
        /// lat,lng;lat,lng;...
        #[arg(long, allow_hyphen_values = true)]
        polygon: String,
    },
    /// Assign every lead inside a polygon to one user.
    Assign {
        #[arg(long, allow_hyphen_values = true)]
        polygon: String,
        #[arg(long)]
        user: String,
    },
    /// List saved territories.
    Territories {
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Save a territory from a polygon or a zip code outline.
    TerritoryCreate {
        #[arg(long)]
        name: String,
        #[arg(long)]
        color: Option<String>,
        #[arg(long, allow_hyphen_values = true, conflicts_with = "zip")]
        polygon: Option<String>,
        #[arg(long)]
        zip: Option<String>,
        #[arg(long = "manager")]
        managers: Vec<String>,
    },
    TerritoryDelete {
        #[arg(long)]
        id: String,
    },
    /// Link managers to every lead inside a saved territory.
    TerritoryManagers {
        #[arg(long)]
        id: String,
        #[arg(long = "manager", required = true)]
        managers: Vec<String>,
    },
    /// List users that leads and territories can be assigned to.
    Managers,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(e) = real_main().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn real_main() -> Result<(), String> {
    let cli = Cli::parse();
    let mut config = GatewayConfig::from_env();
    if let Some(url) = cli.url {
        config = config.with_base_url(url);
    }
    info!(url = %config.base_url, "connecting");
    let gateway = Rc::new(HttpGateway::new(config).map_err(|e| e.to_string())?);
    let map = Rc::new(RecordingMap::new());

    match cli.command {
        Command::View {
            bounds,
            zoom,
            filters,
        } => cmd_view(gateway, map, Viewport { bounds, zoom }, filters).await,
        Command::Stats { polygon } => cmd_stats(gateway, map, &polygon).await,
        Command::Assign { polygon, user } => cmd_assign(gateway, map, &polygon, user).await,
        Command::Territories { search } => cmd_territories(gateway, map, search).await,
        Command::TerritoryCreate {
            name,
            color,
            polygon,
            zip,
            managers,
        } => {
            let shape = match (polygon, zip) {
                (Some(polygon), _) => Shape::Drawn(polygon),
                (None, Some(zip)) => Shape::Zip(zip),
                (None, None) => return Err("either --polygon or --zip is required".to_string()),
            };
            cmd_territory_create(gateway, map, name, color, shape, managers).await
        }
        Command::TerritoryDelete { id } => cmd_territory_delete(gateway, map, id).await,
        Command::TerritoryManagers { id, managers } => {
            cmd_territory_managers(gateway, map, id, managers).await
        }
        Command::Managers => cmd_managers(gateway, map).await,
    }
}

async fn cmd_view(
    gateway: Rc<HttpGateway>,
    map: Rc<RecordingMap>,
    viewport: Viewport,
    filters: Vec<PointFilter>,
) -> Result<(), String> {
    let controller = ViewportController::new(gateway, map.clone());
    controller.set_filters(filters);
    controller.on_idle(viewport).await;
    if let Some(err) = controller.error() {
        return Err(err);
    }

    match DisplayMode::for_zoom(viewport.zoom) {
        DisplayMode::Clusters { lod } => println!(
            "{} clusters at level {lod}",
            controller.marker_count(MarkerLayer::Clusters)
        ),
        DisplayMode::Individuals => println!(
            "{} leads",
            controller.marker_count(MarkerLayer::Individuals)
        ),
    }
    for op in map.ops() {
        if let MapOp::PlaceMarker(_, spec) = op {
            match spec {
                MarkerSpec::Cluster {
                    position, label, ..
                } => println!("  {:>10.5} {:>11.5}  {label}", position.lat, position.lng),
                MarkerSpec::Pin {
                    position, title, ..
                } => println!("  {:>10.5} {:>11.5}  {title}", position.lat, position.lng),
            }
        }
    }
    Ok(())
}

async fn cmd_stats(
    gateway: Rc<HttpGateway>,
    map: Rc<RecordingMap>,
    polygon: &str,
) -> Result<(), String> {
    let session = AssignLeadsSession::new(gateway, map);
    session.set_draw_mode(true);
    session
        .on_overlay_complete(args::parse_vertices(polygon)?)
        .await
        .map_err(|e| e.to_string())?;
    if let Some(err) = session.stats().error() {
        return Err(err);
    }

    let stats = session.stats().stats();
    println!("Total pins: {}", stats.total);
    for line in stats.lines() {
        println!("  {line}");
    }
    Ok(())
}

async fn cmd_assign(
    gateway: Rc<HttpGateway>,
    map: Rc<RecordingMap>,
    polygon: &str,
    user: String,
) -> Result<(), String> {
    let session = AssignLeadsSession::new(gateway, map);
    session.set_draw_mode(true);
    session
        .on_overlay_complete(args::parse_vertices(polygon)?)
        .await
        .map_err(|e| e.to_string())?;
    println!("Total pins: {}", session.stats().stats().total);

    session.select_assignee(Some(user));
    if let Err(e) = session.assign().await {
        return Err(session.workflow().error().unwrap_or_else(|| e.to_string()));
    }
    if let Some(message) = session.workflow().success_message() {
        println!("{message}");
    }

    let mut frame = Frame::new(0, Duration::from_millis(250));
    while session.workflow().is_open() {
        tokio::time::sleep(frame.dt).await;
        frame = frame.next();
        session.advance(frame);
    }
    debug!(elapsed = ?frame.elapsed(), "assign panel closed");
    Ok(())
}

async fn cmd_territories(
    gateway: Rc<HttpGateway>,
    map: Rc<RecordingMap>,
    search: String,
) -> Result<(), String> {
    let panel = TerritoryPanel::new(gateway, map);
    let loaded = panel.reload().await.map_err(|e| e.to_string())?;
    panel.set_query(search);
    let visible = panel.visible();
    println!("{} of {loaded} territories", visible.len());
    for territory in visible {
        println!(
            "  {:<38} {:<8} {:>4} vertices  {}",
            territory.id.to_string(),
            territory.color,
            territory.path.vertex_count(),
            territory.name
        );
    }
    Ok(())
}

enum Shape {
    Drawn(String),
    Zip(String),
}

async fn cmd_territory_create(
    gateway: Rc<HttpGateway>,
    map: Rc<RecordingMap>,
    name: String,
    color: Option<String>,
    shape: Shape,
    managers: Vec<String>,
) -> Result<(), String> {
    let panel = TerritoryPanel::new(gateway, map);
    panel.begin_add();
    panel.update_draft(|draft| {
        draft.name = name;
        if let Some(color) = color {
            draft.color = color;
        }
        draft.manager_ids = managers;
    });

    match shape {
        Shape::Drawn(polygon) => {
            panel
                .on_overlay_complete(args::parse_vertices(&polygon)?)
                .map_err(|e| e.to_string())?;
        }
        Shape::Zip(zip) => {
            panel.set_add_mode(AddMode::Zip);
            panel.update_draft(|draft| draft.zip = zip);
            panel.search_zip().await.map_err(|e| e.to_string())?;
        }
    }

    let id = panel
        .save()
        .await
        .map_err(|e| panel.error().unwrap_or_else(|| e.to_string()))?;
    println!("{}", panel.success_message().unwrap_or_default());
    if let Some(warning) = panel.error() {
        eprintln!("warning: {warning}");
    }
    println!("id: {id}");
    Ok(())
}

async fn cmd_territory_delete(
    gateway: Rc<HttpGateway>,
    map: Rc<RecordingMap>,
    id: String,
) -> Result<(), String> {
    let panel = TerritoryPanel::new(gateway, map);
    panel.reload().await.map_err(|e| e.to_string())?;
    panel
        .delete(&TerritoryId::Saved(id))
        .await
        .map_err(|e| panel.error().unwrap_or_else(|| e.to_string()))?;
    println!("{}", panel.success_message().unwrap_or_default());
    Ok(())
}

async fn cmd_territory_managers(
    gateway: Rc<HttpGateway>,
    map: Rc<RecordingMap>,
    id: String,
    managers: Vec<String>,
) -> Result<(), String> {
    let panel = TerritoryPanel::new(gateway, map);
    panel.reload().await.map_err(|e| e.to_string())?;
    if !panel.select(&TerritoryId::Saved(id.clone())) {
        return Err(format!("no territory with id {id}"));
    }
    panel.set_manager_selection(managers);
    let affected = panel
        .assign_managers()
        .await
        .map_err(|e| panel.error().unwrap_or_else(|| e.to_string()))?;
    println!("{} ({affected} leads)", panel.success_message().unwrap_or_default());
    Ok(())
}

async fn cmd_managers(gateway: Rc<HttpGateway>, map: Rc<RecordingMap>) -> Result<(), String> {
    let panel = TerritoryPanel::new(gateway.clone(), map);
    let managers = panel.load_managers(&*gateway).await;
    if let Some(err) = panel.error() {
        return Err(err);
    }
    for manager in managers {
        println!("  {:<38} {}", manager.user_id, manager.display_name());
    }
    Ok(())
}
