//! Parsers for the coordinate-ish arguments clap can't handle on its own.

use foundation::bounds::LatLngBounds;
use foundation::geo::LatLng;
use streaming::protocol::PointFilter;

/// `south,west,north,east`.
pub fn parse_bounds(s: &str) -> Result<LatLngBounds, String> {
    let parts = parse_numbers(s, ',')?;
    let [south, west, north, east] = parts[..] else {
        return Err(format!("expected south,west,north,east; got {s:?}"));
    };
    if south > north {
        return Err(format!("south {south} is above north {north}"));
    }
    Ok(LatLngBounds::new(
        LatLng::new(south, west),
        LatLng::new(north, east),
    ))
}

/// `lat,lng;lat,lng;...`.
pub fn parse_vertices(s: &str) -> Result<Vec<LatLng>, String> {
    s.split(';')
        .filter(|p| !p.trim().is_empty())
        .map(|pair| {
            let numbers = parse_numbers(pair, ',')?;
            match numbers[..] {
                [lat, lng] => Ok(LatLng::new(lat, lng)),
                _ => Err(format!("expected lat,lng; got {pair:?}")),
            }
        })
        .collect()
}

/// `column<op>value`, e.g. `status=2`, `knocks>=3`, `city LIKE New%`.
pub fn parse_filter(s: &str) -> Result<PointFilter, String> {
    const OPS: [&str; 7] = [">=", "<=", "!=", " LIKE ", "=", ">", "<"];
    for op in OPS {
        if let Some((column, value)) = s.split_once(op) {
            return PointFilter::new(column.trim(), op.trim(), value.trim())
                .map_err(|e| e.to_string());
        }
    }
    Err(format!("no operator in filter {s:?}"))
}

fn parse_numbers(s: &str, sep: char) -> Result<Vec<f64>, String> {
    s.split(sep)
        .map(|p| {
            p.trim()
                .parse::<f64>()
                .map_err(|e| format!("bad number {p:?}: {e}"))
        })
        .collect()
}
