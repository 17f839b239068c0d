use std::fs;

use assert_matches::assert_matches;

use catalog_sync::normalize::{
    RewriteError, normalize_header, normalize_headers, rewrite_header_in_place, rewrite_temp_path,
};

#[test]
fn header_literals() {
    assert_eq!(normalize_header("Provider Name"), "provider_name");
    assert_eq!(normalize_header("CMS Certification #"), "cms_certification_");
    assert_eq!(normalize_header("  multi   space "), "_multi_space_");
    assert_eq!(normalize_header("Score (%)"), "score_");
    assert_eq!(normalize_header("ZIP-Code/Area"), "zip_code_area");
}

#[test]
fn normalization_is_idempotent() {
    let headers = [
        "Provider Name",
        "CMS Certification #",
        "  multi   space ",
        "Hospital overall rating footnote",
        "Émergency Services",
        "__already__snake__",
        "",
    ];
    let once = normalize_headers(headers);
    let twice = normalize_headers(once.iter().map(String::as_str));
    assert_eq!(once, twice);
}

#[test]
fn data_rows_are_copied_byte_for_byte() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("xubh-q36u.csv");
    let rows = concat!(
        "010001,\"SOUTHEAST HEALTH MEDICAL CENTER\",\"1108 ROSS CLARK CIRCLE\",DOTHAN,AL\n",
        "010005,\"MARSHALL MEDICAL CENTERS, INC\",\"2505 U S HIGHWAY 431 NORTH\",BOAZ,AL\n",
        "010006,\"NORTH ALABAMA MEDICAL CENTER\",\"1701 VETERANS DRIVE\",  FLORENCE ,AL\n",
        "010011,\"ST. VINCENT'S EAST\",\"50 MEDICAL PARK EAST DRIVE\",BIRMINGHAM,AL\n",
    );
    let original = format!(
        "Facility ID,\"Facility Name\",\"Address, Line 1\",City/Town,State\n{rows}"
    );
    fs::write(&path, &original).unwrap();

    let rewrite = rewrite_header_in_place(&path).unwrap();
    assert_eq!(
        rewrite.columns,
        vec!["facility_id", "facility_name", "address_line_1", "city_town", "state"]
    );
    assert_eq!(rewrite.data_bytes, rows.len() as u64);

    let rewritten = fs::read_to_string(&path).unwrap();
    let (header, body) = rewritten.split_once('\n').unwrap();
    assert_eq!(header, "facility_id,facility_name,address_line_1,city_town,state");
    assert_eq!(body, rows);
    assert_eq!(body.lines().count(), 4);
}

#[test]
fn header_only_file_without_newline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("header-only.csv");
    fs::write(&path, "Measure ID,Measure Name").unwrap();

    rewrite_header_in_place(&path).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "measure_id,measure_name");
}

#[test]
fn byte_order_mark_is_dropped_from_first_column() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bom.csv");
    fs::write(&path, "\u{feff}Facility ID,State\n010001,AL\n").unwrap();

    let rewrite = rewrite_header_in_place(&path).unwrap();
    assert_eq!(rewrite.columns[0], "facility_id");
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "facility_id,state\n010001,AL\n"
    );
}

#[test]
fn empty_file_is_rejected_and_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.csv");
    fs::write(&path, "").unwrap();

    let err = rewrite_header_in_place(&path).unwrap_err();
    assert_matches!(err, RewriteError::Empty);
    assert!(path.exists());

    let leftovers = fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(leftovers, 1);
}

#[test]
fn stray_quote_inside_header_cell_keeps_data_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("heights.csv");
    fs::write(&path, "Height 5'11\",State\n010001,AL\n010005,GA\n").unwrap();

    let rewrite = rewrite_header_in_place(&path).unwrap();
    assert_eq!(rewrite.columns, vec!["height_5_11_", "state"]);
    assert_eq!(rewrite.data_bytes, "010001,AL\n010005,GA\n".len() as u64);
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "height_5_11_,state\n010001,AL\n010005,GA\n"
    );
}

#[test]
fn quoted_line_break_stays_inside_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("multiline.csv");
    fs::write(&path, "\"Address\nLine 1\",State\r\n010001,AL\r\n").unwrap();

    let rewrite = rewrite_header_in_place(&path).unwrap();
    assert_eq!(rewrite.columns, vec!["address_line_1", "state"]);
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "address_line_1,state\r\n010001,AL\r\n"
    );
}

#[test]
fn stale_rewrite_temp_file_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("xubh-q36u.csv.part");
    let stale = rewrite_temp_path(&path);
    assert_eq!(stale, dir.path().join("xubh-q36u.csv.part.tmp"));
    fs::write(&stale, "half written garbage").unwrap();
    fs::write(&path, "Facility ID\n010001\n").unwrap();

    rewrite_header_in_place(&path).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "facility_id\n010001\n");
    assert!(!stale.exists());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}
