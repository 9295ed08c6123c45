mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use common::{raster_archive, vector_archive, FakeContext};
use fieldmap::constants::{INITIAL_CENTER, INITIAL_ZOOM, POINT_ZOOM};
use fieldmap::core::config::KEY_REFERENCE_LAYER;
use fieldmap::map::FragmentState;
use fieldmap::providers::google::{GoogleMapEvent, KEY_MAP_TYPE};
use fieldmap::providers::mapbox::{LayerKind, MapboxMapEvent, SourceKind, KEY_STYLE_URL};
use fieldmap::providers::osm::{GeoPoint, OsmMapEvent, Overlay};
use fieldmap::tiles::TileSource;
use fieldmap::{
    ConfigBundle, FeatureId, GoogleMapFragment, IconAnchor, LatLng, Location, MainLooper,
    MapContext, MapFragment, MapHost, MapPoint, MapboxMapFragment, MarkerIcon, OsmMapFragment,
    TileHttpServer,
};

#[derive(Debug, Clone, Copy)]
enum Kind {
    Google,
    Mapbox,
    Osm,
}

const ALL: [Kind; 3] = [Kind::Google, Kind::Mapbox, Kind::Osm];

fn new_fragment(kind: Kind, context: &Rc<FakeContext>) -> Rc<dyn MapFragment> {
    let context: Rc<dyn MapContext> = context.clone();
    match kind {
        Kind::Google => Rc::new(GoogleMapFragment::new(context)),
        Kind::Mapbox => Rc::new(MapboxMapFragment::new(context)),
        Kind::Osm => Rc::new(OsmMapFragment::new(context)),
    }
}

/// Attaches `fragment` and drains the looper; returns whether it became ready.
fn attach(fragment: &Rc<dyn MapFragment>, host: &MapHost) -> bool {
    let ready = Rc::new(Cell::new(false));
    let flag = ready.clone();
    fragment.add_to(host, "map", Box::new(move |_| flag.set(true)), None);
    host.looper().run_until_idle();
    ready.get()
}

struct Harness {
    context: Rc<FakeContext>,
    host: MapHost,
    fragment: Rc<dyn MapFragment>,
}

fn ready_fragment(kind: Kind) -> Harness {
    let context = Rc::new(FakeContext::new());
    let host = MapHost::new(MainLooper::new());
    let fragment = new_fragment(kind, &context);
    assert!(attach(&fragment, &host), "{:?} map never became ready", kind);
    Harness {
        context,
        host,
        fragment,
    }
}

/// Drags vertex `index` of `feature` to `to`, through the vendor events.
fn drag(fragment: &Rc<dyn MapFragment>, feature: FeatureId, index: usize, to: LatLng) {
    let any = fragment.as_any();
    if let Some(google) = any.downcast_ref::<GoogleMapFragment>() {
        let marker = google.feature_markers(feature)[index];
        google.dispatch(GoogleMapEvent::MarkerDragStart(marker, to));
        google.dispatch(GoogleMapEvent::MarkerDrag(marker, to));
        google.dispatch(GoogleMapEvent::MarkerDragEnd(marker, to));
    } else if let Some(mapbox) = any.downcast_ref::<MapboxMapFragment>() {
        let symbol = mapbox.feature_symbols(feature)[index];
        mapbox.dispatch(MapboxMapEvent::SymbolDragStarted(symbol, to));
        mapbox.dispatch(MapboxMapEvent::SymbolDrag(symbol, to));
        mapbox.dispatch(MapboxMapEvent::SymbolDragFinished(symbol, to));
    } else if let Some(osm) = any.downcast_ref::<OsmMapFragment>() {
        let marker = osm.feature_markers(feature)[index];
        // The view reports the marker's old altitude along with the drag.
        let position = GeoPoint::new(to.lat, to.lng, 120.0);
        osm.dispatch(OsmMapEvent::MarkerDragStart(marker, position));
        osm.dispatch(OsmMapEvent::MarkerDrag(marker, position));
        osm.dispatch(OsmMapEvent::MarkerDragEnd(marker, position));
    } else {
        panic!("unknown fragment type");
    }
}

fn click_marker(fragment: &Rc<dyn MapFragment>, feature: FeatureId) {
    let any = fragment.as_any();
    if let Some(google) = any.downcast_ref::<GoogleMapFragment>() {
        google.dispatch(GoogleMapEvent::MarkerClick(google.feature_markers(feature)[0]));
    } else if let Some(mapbox) = any.downcast_ref::<MapboxMapFragment>() {
        mapbox.dispatch(MapboxMapEvent::SymbolClick(mapbox.feature_symbols(feature)[0]));
    } else if let Some(osm) = any.downcast_ref::<OsmMapFragment>() {
        osm.dispatch(OsmMapEvent::MarkerClick(osm.feature_markers(feature)[0]));
    }
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {}, got {}",
        expected,
        actual
    );
}

#[test]
fn test_ids_increase_and_reset_on_clear() {
    for kind in ALL {
        let h = ready_fragment(kind);
        let f = &h.fragment;

        let a = f.add_marker(MapPoint::new(1.0, 1.0), false, IconAnchor::Bottom).unwrap();
        let b = f
            .add_draggable_poly(&[MapPoint::new(0.0, 0.0), MapPoint::new(1.0, 0.0)], false)
            .unwrap();
        assert_eq!((a.get(), b.get()), (1, 2), "{:?}", kind);

        f.remove_feature(a);
        let c = f.add_marker(MapPoint::new(2.0, 2.0), false, IconAnchor::Center).unwrap();
        assert_eq!(c.get(), 3, "{:?} reused a removed id", kind);
        assert!(f.marker_point(a).is_none());

        f.clear_features();
        assert!(f.marker_point(c).is_none());
        assert!(f.poly_points(b).is_empty());
        let d = f.add_marker(MapPoint::new(3.0, 3.0), false, IconAnchor::Center).unwrap();
        assert_eq!(d.get(), 1, "{:?}", kind);
    }
}

#[test]
fn test_marker_alt_and_sd_survive_round_trip() {
    for kind in ALL {
        let h = ready_fragment(kind);
        let point = MapPoint::with_altitude(12.5, -71.25, 310.5, 4.75);
        let id = h.fragment.add_marker(point, true, IconAnchor::Bottom).unwrap();
        assert_eq!(h.fragment.marker_point(id), Some(point), "{:?}", kind);

        let poly = h
            .fragment
            .add_draggable_poly(&[point, MapPoint::new(13.0, -71.0)], true)
            .unwrap();
        assert_eq!(h.fragment.poly_points(poly)[0], point, "{:?}", kind);
        assert!(h.fragment.marker_point(poly).is_none());
    }
}

#[test]
fn test_not_ready_map_ignores_calls() {
    for kind in ALL {
        let context = Rc::new(FakeContext::new());
        let fragment = new_fragment(kind, &context);

        assert_eq!(fragment.center(), INITIAL_CENTER);
        assert_eq!(fragment.zoom(), INITIAL_ZOOM);
        assert!(fragment
            .add_marker(MapPoint::new(1.0, 2.0), false, IconAnchor::Center)
            .is_none());
        assert!(fragment
            .add_draggable_poly(&[MapPoint::new(1.0, 2.0)], false)
            .is_none());
        fragment.set_center(MapPoint::new(40.0, 40.0), false);
        fragment.zoom_to_point(MapPoint::new(40.0, 40.0), true);
        fragment.clear_features();
        assert_eq!(fragment.center(), INITIAL_CENTER, "{:?}", kind);
    }
}

#[test]
fn test_ready_map_starts_at_initial_camera() {
    for kind in ALL {
        let h = ready_fragment(kind);
        assert_eq!(h.fragment.center(), INITIAL_CENTER, "{:?}", kind);
        assert_eq!(h.fragment.zoom(), INITIAL_ZOOM, "{:?}", kind);
        assert_eq!(h.host.attached_to("map"), Some(h.fragment.instance_id()));
    }
}

#[test]
fn test_zoom_to_point_uses_point_zoom() {
    for kind in ALL {
        let h = ready_fragment(kind);
        let target = MapPoint::new(-33.9, 18.4);
        h.fragment.zoom_to_point(target, false);
        assert_eq!(h.fragment.center(), target, "{:?}", kind);
        assert_eq!(h.fragment.zoom(), POINT_ZOOM, "{:?}", kind);

        h.fragment.zoom_to_point_at(MapPoint::new(1.0, 1.0), 9.0, true);
        assert_eq!(h.fragment.zoom(), 9.0, "{:?}", kind);

        h.fragment.set_center(MapPoint::new(5.0, 6.0), false);
        assert_eq!(h.fragment.center(), MapPoint::new(5.0, 6.0));
        assert_eq!(h.fragment.zoom(), 9.0, "{:?} changed zoom on set_center", kind);
    }
}

#[test]
fn test_bounding_box_with_no_or_one_point() {
    for kind in ALL {
        let h = ready_fragment(kind);
        h.fragment.zoom_to_bounding_box(&[], 0.8, false);
        assert_eq!(h.fragment.center(), INITIAL_CENTER, "{:?}", kind);
        assert_eq!(h.fragment.zoom(), INITIAL_ZOOM, "{:?}", kind);

        let only = MapPoint::new(48.2, 16.37);
        h.fragment.zoom_to_bounding_box(&[only], 0.8, false);
        assert_eq!(h.fragment.center(), only, "{:?}", kind);
        assert_eq!(h.fragment.zoom(), POINT_ZOOM, "{:?}", kind);
    }
}

#[test]
fn test_bounding_box_fits_points() {
    for kind in ALL {
        let h = ready_fragment(kind);
        let points = [
            MapPoint::new(10.0, 10.0),
            MapPoint::new(20.0, 30.0),
            MapPoint::new(15.0, 20.0),
        ];
        h.fragment.zoom_to_bounding_box(&points, 0.8, false);

        let center = h.fragment.center();
        assert_close(center.lat, 15.0);
        assert_close(center.lon, 20.0);
        let zoom = h.fragment.zoom();
        assert!(zoom > 4.0 && zoom < 7.0, "{:?} zoom {}", kind, zoom);
    }
}

#[test]
fn test_bounding_box_across_antimeridian() {
    for kind in ALL {
        let h = ready_fragment(kind);
        let points = [MapPoint::new(-17.0, 179.0), MapPoint::new(-18.0, -179.0)];
        h.fragment.zoom_to_bounding_box(&points, 0.8, false);

        let center = h.fragment.center();
        assert!(center.lon.abs() > 179.9, "{:?} centered at {:?}", kind, center);
        assert_close(center.lat, -17.5);
        assert!(h.fragment.zoom() > 5.0, "{:?} zoomed out to the whole world", kind);
    }
}

#[test]
fn test_bounding_box_near_pole_stays_on_the_globe() {
    let h = ready_fragment(Kind::Google);
    let points = [MapPoint::new(80.0, 0.0), MapPoint::new(89.0, 10.0)];
    h.fragment.zoom_to_bounding_box(&points, 0.1, false);
    let center = h.fragment.center();
    assert!(center.lat <= 90.0 && center.lat >= -90.0);
}

#[test]
fn test_drag_resets_fix_and_fires_drag_end_once() {
    for kind in ALL {
        let h = ready_fragment(kind);
        let drags = Rc::new(RefCell::new(Vec::new()));
        let log = drags.clone();
        h.fragment
            .set_drag_end_listener(Some(Rc::new(move |id| log.borrow_mut().push(id))));

        let poly = h
            .fragment
            .add_draggable_poly(
                &[
                    MapPoint::with_altitude(0.0, 0.0, 100.0, 5.0),
                    MapPoint::with_altitude(1.0, 1.0, 110.0, 6.0),
                    MapPoint::with_altitude(2.0, 0.0, 120.0, 7.0),
                ],
                true,
            )
            .unwrap();

        drag(&h.fragment, poly, 1, LatLng::new(1.5, 2.5));

        let points = h.fragment.poly_points(poly);
        assert_eq!(points[1], MapPoint::new(1.5, 2.5), "{:?}", kind);
        assert_eq!(points[0], MapPoint::with_altitude(0.0, 0.0, 100.0, 5.0));
        assert_eq!(*drags.borrow(), vec![poly], "{:?}", kind);
    }
}

#[test]
fn test_drag_without_listener_still_moves_marker() {
    for kind in ALL {
        let h = ready_fragment(kind);
        let marker = h
            .fragment
            .add_marker(MapPoint::with_altitude(3.0, 3.0, 9.0, 1.0), true, IconAnchor::Bottom)
            .unwrap();
        drag(&h.fragment, marker, 0, LatLng::new(4.0, 4.0));
        assert_eq!(h.fragment.marker_point(marker), Some(MapPoint::new(4.0, 4.0)), "{:?}", kind);
    }
}

#[test]
fn test_google_drag_redraws_closed_polyline() {
    let h = ready_fragment(Kind::Google);
    let google = h.fragment.as_any().downcast_ref::<GoogleMapFragment>().unwrap();
    let poly = h
        .fragment
        .add_draggable_poly(
            &[MapPoint::new(0.0, 0.0), MapPoint::new(0.0, 1.0), MapPoint::new(1.0, 1.0)],
            true,
        )
        .unwrap();
    drag(&h.fragment, poly, 2, LatLng::new(2.0, 2.0));

    let polyline = google.feature_polyline(poly).unwrap();
    let points = google.with_map(|map| map.unwrap().polyline(polyline).unwrap().points.clone());
    assert_eq!(points.len(), 4);
    assert_eq!(points[2], LatLng::new(2.0, 2.0));
    assert_eq!(points[3], points[0]);
}

#[test]
fn test_poly_append_and_remove_last_point() {
    for kind in ALL {
        let h = ready_fragment(kind);
        let poly = h.fragment.add_draggable_poly(&[], false).unwrap();
        assert!(h.fragment.poly_points(poly).is_empty());

        h.fragment.append_point_to_poly(poly, MapPoint::new(1.0, 1.0));
        h.fragment
            .append_point_to_poly(poly, MapPoint::with_altitude(2.0, 2.0, 50.0, 3.0));
        assert_eq!(
            h.fragment.poly_points(poly),
            vec![MapPoint::new(1.0, 1.0), MapPoint::with_altitude(2.0, 2.0, 50.0, 3.0)],
            "{:?}",
            kind
        );

        h.fragment.remove_poly_last_point(poly);
        h.fragment.remove_poly_last_point(poly);
        h.fragment.remove_poly_last_point(poly);
        assert!(h.fragment.poly_points(poly).is_empty(), "{:?}", kind);
    }
}

#[test]
fn test_osm_poly_vertex_count_matches_overlays() {
    let h = ready_fragment(Kind::Osm);
    let osm = h.fragment.as_any().downcast_ref::<OsmMapFragment>().unwrap();
    let poly = h
        .fragment
        .add_draggable_poly(&[MapPoint::new(0.0, 0.0), MapPoint::new(1.0, 0.0)], false)
        .unwrap();
    h.fragment.append_point_to_poly(poly, MapPoint::new(2.0, 0.0));
    assert_eq!(osm.feature_markers(poly).len(), 3);

    let line = osm.feature_polyline(poly).unwrap();
    let drawn = osm.with_map(|view| match view.unwrap().overlay(line) {
        Some(Overlay::Polyline(polyline)) => polyline.points.len(),
        _ => 0,
    });
    assert_eq!(drawn, 3);

    h.fragment.remove_feature(poly);
    assert_eq!(osm.with_map(|view| view.unwrap().overlays().count()), 0);
}

#[test]
fn test_marker_icon_and_click() {
    for kind in ALL {
        let h = ready_fragment(kind);
        let clicked = Rc::new(Cell::new(None));
        let slot = clicked.clone();
        h.fragment
            .set_feature_click_listener(Some(Rc::new(move |id| slot.set(Some(id)))));

        h.fragment.add_marker(MapPoint::new(0.0, 0.0), false, IconAnchor::Center);
        let second = h
            .fragment
            .add_marker(MapPoint::new(1.0, 1.0), false, IconAnchor::Center)
            .unwrap();
        h.fragment.set_marker_icon(second, MarkerIcon::Highlighted);
        click_marker(&h.fragment, second);
        assert_eq!(clicked.get(), Some(second), "{:?}", kind);
    }

    let h = ready_fragment(Kind::Google);
    let google = h.fragment.as_any().downcast_ref::<GoogleMapFragment>().unwrap();
    let id = h
        .fragment
        .add_marker(MapPoint::new(1.0, 1.0), false, IconAnchor::Bottom)
        .unwrap();
    h.fragment.set_marker_icon(id, MarkerIcon::Resource(42));
    let marker = google.feature_markers(id)[0];
    google.with_map(|map| {
        let marker = map.unwrap().marker(marker).unwrap();
        assert_eq!(marker.icon, MarkerIcon::Resource(42));
        assert_eq!(marker.anchor, (0.5, 1.0));
    });
}

#[test]
fn test_click_listeners_last_setter_wins() {
    let h = ready_fragment(Kind::Osm);
    let osm = h.fragment.as_any().downcast_ref::<OsmMapFragment>().unwrap();
    let first = Rc::new(Cell::new(0));
    let second = Rc::new(RefCell::new(Vec::new()));

    let counter = first.clone();
    h.fragment
        .set_click_listener(Some(Rc::new(move |_| counter.set(counter.get() + 1))));
    let points = second.clone();
    h.fragment
        .set_click_listener(Some(Rc::new(move |p| points.borrow_mut().push(p))));

    osm.dispatch(OsmMapEvent::SingleTap(GeoPoint::new(5.0, 6.0, 0.0)));
    assert_eq!(first.get(), 0);
    assert_eq!(*second.borrow(), vec![MapPoint::new(5.0, 6.0)]);

    h.fragment.set_click_listener(None);
    osm.dispatch(OsmMapEvent::SingleTap(GeoPoint::new(7.0, 8.0, 0.0)));
    assert_eq!(second.borrow().len(), 1);
}

#[test]
fn test_long_press_reaches_listener() {
    let h = ready_fragment(Kind::Mapbox);
    let mapbox = h.fragment.as_any().downcast_ref::<MapboxMapFragment>().unwrap();
    let pressed = Rc::new(Cell::new(None));
    let slot = pressed.clone();
    h.fragment
        .set_long_press_listener(Some(Rc::new(move |p| slot.set(Some(p)))));
    mapbox.dispatch(MapboxMapEvent::LongClick(LatLng::new(-1.0, 2.0)));
    assert_eq!(pressed.get(), Some(MapPoint::new(-1.0, 2.0)));
}

#[test]
fn test_destroy_before_ready_skips_listener() {
    for kind in ALL {
        let context = Rc::new(FakeContext::new());
        let host = MapHost::new(MainLooper::new());
        let fragment = new_fragment(kind, &context);

        let ready = Rc::new(Cell::new(false));
        let flag = ready.clone();
        fragment.add_to(&host, "map", Box::new(move |_| flag.set(true)), None);
        fragment.on_destroy();
        host.looper().run_until_idle();

        assert!(!ready.get(), "{:?} reported ready after destroy", kind);
        assert_eq!(fragment.center(), INITIAL_CENTER);
    }
}

#[test]
fn test_dropped_fragment_skips_listener() {
    let context = Rc::new(FakeContext::new());
    let host = MapHost::new(MainLooper::new());
    let fragment = new_fragment(Kind::Osm, &context);
    let ready = Rc::new(Cell::new(false));
    let flag = ready.clone();
    fragment.add_to(&host, "map", Box::new(move |_| flag.set(true)), None);
    drop(fragment);
    host.looper().run_until_idle();
    assert!(!ready.get());
}

#[test]
fn test_unavailable_vendor_calls_error_listener() {
    let cases = [
        (Kind::Google, FakeContext::without_play_services()),
        (Kind::Mapbox, FakeContext::without_mapbox_token()),
    ];
    for (kind, context) in cases {
        let context = Rc::new(context);
        let host = MapHost::new(MainLooper::new());
        let fragment = new_fragment(kind, &context);

        let ready = Rc::new(Cell::new(false));
        let errors = Rc::new(Cell::new(0));
        let ready_flag = ready.clone();
        let error_count = errors.clone();
        fragment.add_to(
            &host,
            "map",
            Box::new(move |_| ready_flag.set(true)),
            Some(Box::new(move || error_count.set(error_count.get() + 1))),
        );
        host.looper().run_until_idle();

        assert!(!ready.get(), "{:?}", kind);
        assert_eq!(errors.get(), 1, "{:?}", kind);
        assert!(fragment
            .add_marker(MapPoint::new(0.0, 0.0), false, IconAnchor::Center)
            .is_none());
    }
}

#[test]
fn test_mapbox_ready_waits_for_style() {
    let context = Rc::new(FakeContext::new());
    let host = MapHost::new(MainLooper::new());
    let mapbox = Rc::new(MapboxMapFragment::new(context.clone()));
    let fragment: Rc<dyn MapFragment> = mapbox.clone();

    let ready = Rc::new(Cell::new(false));
    let flag = ready.clone();
    fragment.add_to(&host, "map", Box::new(move |_| flag.set(true)), None);

    assert_eq!(host.looper().run_pending(), 1);
    assert!(!ready.get());
    assert_eq!(mapbox.state(), FragmentState::Attaching);
    assert!(fragment
        .add_marker(MapPoint::new(0.0, 0.0), false, IconAnchor::Center)
        .is_none());

    assert_eq!(host.looper().run_pending(), 1);
    assert!(ready.get());
    assert_eq!(mapbox.state(), FragmentState::Ready);
    let url = mapbox.with_map(|map| map.unwrap().style().unwrap().url().to_string());
    assert_eq!(url, "mapbox://styles/mapbox/streets-v11");
}

#[test]
fn test_mapbox_style_change_keeps_features() {
    let h = ready_fragment(Kind::Mapbox);
    let mapbox = h.fragment.as_any().downcast_ref::<MapboxMapFragment>().unwrap();
    let marker = h
        .fragment
        .add_marker(MapPoint::new(1.0, 1.0), false, IconAnchor::Center)
        .unwrap();

    let mut config = ConfigBundle::new();
    config.put_string(KEY_STYLE_URL, "mapbox://styles/mapbox/dark-v10");
    h.fragment.apply_config(&config);
    h.host.looper().run_until_idle();

    let url = mapbox.with_map(|map| map.unwrap().style().unwrap().url().to_string());
    assert_eq!(url, "mapbox://styles/mapbox/dark-v10");
    assert_eq!(h.fragment.marker_point(marker), Some(MapPoint::new(1.0, 1.0)));
}

#[test]
fn test_google_config_sets_map_type_and_overlay() {
    let dir = tempfile::tempdir().unwrap();
    let raster = raster_archive(dir.path(), "imagery.mbtiles", "Imagery");
    let vector = vector_archive(dir.path(), "roads.mbtiles", "Roads");

    let h = ready_fragment(Kind::Google);
    let google = h.fragment.as_any().downcast_ref::<GoogleMapFragment>().unwrap();

    let mut config = ConfigBundle::new();
    config.put_int(KEY_MAP_TYPE, 2);
    config.put_string(KEY_REFERENCE_LAYER, raster.to_string_lossy());
    h.fragment.apply_config(&config);
    google.with_map(|map| {
        let map = map.unwrap();
        assert_eq!(map.map_type(), 2);
        assert_eq!(map.tile_overlay().unwrap().provider.content_type(), "image/png");
    });

    config.put_string(KEY_REFERENCE_LAYER, vector.to_string_lossy());
    h.fragment.apply_config(&config);
    assert!(google.with_map(|map| map.unwrap().tile_overlay().is_none()));
}

#[test]
fn test_config_before_ready_is_applied_on_ready() {
    let dir = tempfile::tempdir().unwrap();
    let raster = raster_archive(dir.path(), "imagery.mbtiles", "Imagery");

    let context = Rc::new(FakeContext::new());
    let host = MapHost::new(MainLooper::new());
    let osm = Rc::new(OsmMapFragment::new(context.clone()));
    let fragment: Rc<dyn MapFragment> = osm.clone();

    let mut config = ConfigBundle::new();
    config.put_string(KEY_REFERENCE_LAYER, raster.to_string_lossy());
    fragment.apply_config(&config);
    assert!(attach(&fragment, &host));

    let first = osm.with_map(|view| match view.unwrap().overlays().next() {
        Some((_, Overlay::Tiles(tiles))) => tiles.provider.content_type().to_string(),
        _ => String::new(),
    });
    assert_eq!(first, "image/png");

    fragment.add_marker(MapPoint::new(0.0, 0.0), false, IconAnchor::Center);
    fragment.apply_config(&ConfigBundle::new());
    let tiles = osm.with_map(|view| {
        view.unwrap()
            .overlays()
            .filter(|(_, overlay)| matches!(overlay, Overlay::Tiles(_)))
            .count()
    });
    assert_eq!(tiles, 0);
}

#[test]
fn test_unusable_reference_layer_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.mbtiles");
    for kind in ALL {
        let h = ready_fragment(kind);
        let mut config = ConfigBundle::new();
        config.put_string(KEY_REFERENCE_LAYER, missing.to_string_lossy());
        h.fragment.apply_config(&config);
        h.host.looper().run_until_idle();
        assert!(h
            .fragment
            .add_marker(MapPoint::new(0.0, 0.0), false, IconAnchor::Center)
            .is_some());
    }
}

#[test]
fn test_mapbox_vector_reference_layer_is_served() {
    let dir = tempfile::tempdir().unwrap();
    let vector = vector_archive(dir.path(), "roads.mbtiles", "Roads");

    let h = ready_fragment(Kind::Mapbox);
    let mapbox = h.fragment.as_any().downcast_ref::<MapboxMapFragment>().unwrap();
    let source_id = format!("reference-{}", h.fragment.instance_id());

    let mut config = ConfigBundle::new();
    config.put_string(KEY_REFERENCE_LAYER, vector.to_string_lossy());
    h.fragment.apply_config(&config);
    h.host.looper().run_until_idle();

    let server = TileHttpServer::shared().unwrap();
    assert!(server.has_source(&source_id));

    mapbox.with_map(|map| {
        let style = map.unwrap().style().unwrap();
        let source = style.source(&source_id).unwrap();
        assert_eq!(source.kind, SourceKind::Vector);
        assert_eq!(source.tiles, vec![server.url_template(&source_id)]);

        let layers: Vec<&LayerKind> = style
            .layers()
            .iter()
            .filter(|layer| layer.source == source_id)
            .map(|layer| &layer.kind)
            .collect();
        assert_eq!(
            layers,
            vec![
                &LayerKind::Line {
                    source_layer: "roads".to_string()
                },
                &LayerKind::Line {
                    source_layer: "water".to_string()
                },
            ]
        );
    });

    h.fragment.on_destroy();
    assert!(!server.has_source(&source_id));
}

#[test]
fn test_gps_ready_listeners_queue_until_first_fix() {
    for kind in ALL {
        let h = ready_fragment(kind);
        let feed = h.context.feed.clone();
        let fired = Rc::new(Cell::new(0));
        let fixes = Rc::new(RefCell::new(Vec::new()));

        let log = fixes.clone();
        h.fragment
            .set_gps_location_listener(Some(Rc::new(move |p| log.borrow_mut().push(p))));
        h.fragment.set_gps_location_enabled(true);
        assert!(!feed.is_started(), "{:?} started before resume", kind);
        h.fragment.on_resume();
        assert!(feed.is_started(), "{:?}", kind);

        for _ in 0..2 {
            let count = fired.clone();
            h.fragment
                .run_on_gps_location_ready(Box::new(move |_| count.set(count.get() + 1)));
        }
        assert_eq!(fired.get(), 0);
        assert!(h.fragment.gps_location().is_none());

        let fix = Location::new(-1.25, 36.8).with_fix(1700.0, 8.0).with_provider("gps");
        assert!(feed.deliver(fix.clone()));
        assert_eq!(fired.get(), 2, "{:?}", kind);
        assert!(feed.deliver(fix.clone()));
        assert_eq!(fired.get(), 2, "{:?} ran queued listeners twice", kind);

        let point = MapPoint::with_altitude(-1.25, 36.8, 1700.0, 8.0);
        assert_eq!(h.fragment.gps_location(), Some(point));
        assert_eq!(h.fragment.location_provider().as_deref(), Some("gps"));
        assert_eq!(*fixes.borrow(), vec![point, point]);

        let count = fired.clone();
        h.fragment
            .run_on_gps_location_ready(Box::new(move |_| count.set(count.get() + 1)));
        assert_eq!(fired.get(), 3, "{:?} did not run immediately", kind);
    }
}

#[test]
fn test_gps_follows_pause_and_enable() {
    for kind in ALL {
        let h = ready_fragment(kind);
        let feed = h.context.feed.clone();

        h.fragment.on_resume();
        assert!(!feed.is_started());
        h.fragment.set_gps_location_enabled(true);
        assert!(feed.is_started(), "{:?}", kind);

        h.fragment.on_pause();
        assert!(!feed.is_started(), "{:?} kept updates running while paused", kind);
        h.fragment.on_resume();
        assert!(feed.is_started());
        assert_eq!(feed.starts(), 2);

        h.fragment.set_gps_location_enabled(false);
        assert!(!feed.is_started());
        assert!(!feed.deliver(Location::new(1.0, 1.0)));
        assert!(h.fragment.gps_location().is_none());
    }
}

#[test]
fn test_google_crosshairs_follow_fix() {
    let h = ready_fragment(Kind::Google);
    let google = h.fragment.as_any().downcast_ref::<GoogleMapFragment>().unwrap();
    h.fragment.set_gps_location_enabled(true);
    h.fragment.on_resume();
    h.context.feed.deliver(Location::new(10.0, 20.0));
    h.context.feed.deliver(Location::new(11.0, 21.0));

    let crosshairs: Vec<LatLng> = google.with_map(|map| {
        map.unwrap()
            .markers()
            .filter(|(_, marker)| marker.icon == MarkerIcon::Crosshairs)
            .map(|(_, marker)| marker.position)
            .collect()
    });
    assert_eq!(crosshairs, vec![LatLng::new(11.0, 21.0)]);

    h.fragment.set_gps_location_enabled(false);
    let remaining = google.with_map(|map| map.unwrap().markers().count());
    assert_eq!(remaining, 0);
}
