pub const DEFAULT_LOOKUP_BASE_URL: &str = "http://127.0.0.1:5000/api/getdata";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const USER_AGENT: &str = "practitioner-lookup/0.1";

pub const NPI_LEN: usize = 10;
pub const CSV_HEADER: [&str; 3] = ["first_name", "last_name", "npi"];

pub const MIME_CSV: &str = "text/csv";
pub const MIME_EXCEL_CSV: &str = "application/vnd.ms-excel";
pub const MIME_JSON: &str = "application/json";
pub const MIME_UNKNOWN: &str = "application/octet-stream";

pub const DOWNLOAD_FILE_NAME: &str = "data.json";

/// Source name -> row background colour.
pub const ENDPOINT_COLORS: [(&str, &str); 6] = [
    ("Kaiser", "#ADD8E6"),
    ("Humana", "#E6E6FA"),
    ("Cigna", "#FFE4E1"),
    ("PacificSource", "#8FBC8F"),
    ("Centene", "#D3D3D3"),
    ("Consensus", "#64A1EC"),
];

pub const REQUIRED_JSON_FORMAT: &str = r#"{
    "practitioners": [
        {
          "npi": "string",
          "first_name": "string",
          "last_name": "string"
        }
    ]
}"#;
