// src/constants.rs
//! Domain constants that define the operational boundaries of the system.
//!
//! Each constant is named for the domain concept it constrains, not its
//! technical role.

// ---------------------------------------------------------------------------
// Artifact layout
// ---------------------------------------------------------------------------

/// Widest a worksheet column may grow, in character widths.
///
/// Free-text columns (remarks, addresses) would otherwise produce columns
/// hundreds of characters wide.
pub const MAX_COLUMN_WIDTH: usize = 50;

/// Extra character widths added to the longest value in a column.
pub const COLUMN_WIDTH_PADDING: usize = 2;

/// Fill colour of the header row.
pub const HEADER_FILL_RGB: u32 = 0x366092;

/// Font colour of the header row.
pub const HEADER_FONT_RGB: u32 = 0xFFFFFF;

/// Spreadsheet applications reject longer worksheet names.
pub const MAX_SHEET_NAME_LENGTH: usize = 31;

/// Timestamp embedded in artifact filenames (`<prefix>_<timestamp><ext>`).
pub const ARTIFACT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Suffix of the scratch file a workbook is written to before it is renamed
/// into place.
pub const PARTIAL_FILE_SUFFIX: &str = ".partial";

/// How many numbered alternatives are tried when an artifact name is taken.
pub const MAX_ARTIFACT_NAME_ATTEMPTS: u32 = 1000;

// ---------------------------------------------------------------------------
// Database boundaries
// ---------------------------------------------------------------------------

/// Encodings the Oracle client session can be asked for. The client always
/// negotiates AL32UTF8, so only UTF-8 spellings are meaningful.
pub const SUPPORTED_ENCODINGS: &[&str] = &["UTF-8", "UTF8", "AL32UTF8"];

/// Statement used to prove a session can execute queries.
pub const DEFAULT_PROBE_QUERY: &str = "SELECT 1 FROM DUAL";

/// Default Oracle listener port.
pub const DEFAULT_DATABASE_PORT: u16 = 1521;

/// How long the diagnostics harness waits for the listener to accept a TCP
/// connection.
pub const LISTENER_PROBE_TIMEOUT_SECS: u64 = 5;

// ---------------------------------------------------------------------------
// Delivery boundaries
// ---------------------------------------------------------------------------

/// Window within which an element or page signal must appear.
pub const DEFAULT_ELEMENT_WAIT_SECS: u64 = 20;

/// Delay between two checks of an element or page signal.
pub const SIGNAL_POLL_INTERVAL_MS: u64 = 250;

/// WebDriver endpoint used when none is configured (chromedriver default is
/// 9515, selenium standalone 4444).
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";

/// Browser window size requested for every session.
pub const BROWSER_WINDOW_SIZE: &str = "1920,1080";

/// Date shown in the message subject.
pub const DELIVERY_DATE_FORMAT: &str = "%Y年%m月%d日";

/// Timestamp shown in the message body.
pub const GENERATED_AT_FORMAT: &str = "%Y年%m月%d日 %H:%M:%S";

/// Timeout for the plain HTTP reachability probe of the mail UI.
pub const HTTP_PROBE_TIMEOUT_SECS: u64 = 10;
