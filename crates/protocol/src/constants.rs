/// Files strictly smaller than this many bytes go through a single
/// multipart request; everything else uses the chunked protocol.
pub const DIRECT_UPLOAD_THRESHOLD: u64 = 4_000_000;

/// Size of each PATCH body sent by the chunked uploader (4 MiB).
pub const CHUNK_SIZE: usize = 4_194_304;

/// Subdomain substituted onto the service host for upload traffic.
pub const UPLOAD_SUBDOMAIN: &str = "upload";

/// Default service host.
pub const DEFAULT_SERVICE_HOST: &str = "put.io";

/// Path of the single-request upload endpoint.
pub const DIRECT_UPLOAD_PATH: &str = "/v2/files/upload";

/// Path where chunked upload sessions are created.
pub const CHUNKED_UPLOAD_PATH: &str = "/files/";

/// Prefix of the `Authorization` header value (`token <value>`).
pub const AUTH_SCHEME: &str = "token";

// ---------------------------------------------------------------------------
// Direct upload form fields
// ---------------------------------------------------------------------------

pub const FORM_FILE: &str = "file";
pub const FORM_FILENAME: &str = "filename";
pub const FORM_PARENT_ID: &str = "parent_id";

// ---------------------------------------------------------------------------
// tus protocol
// ---------------------------------------------------------------------------

/// Protocol version sent in every tus request.
pub const TUS_VERSION: &str = "1.0.0";

pub const HEADER_TUS_RESUMABLE: &str = "Tus-Resumable";
pub const HEADER_UPLOAD_LENGTH: &str = "Upload-Length";
pub const HEADER_UPLOAD_OFFSET: &str = "Upload-Offset";
pub const HEADER_UPLOAD_METADATA: &str = "Upload-Metadata";

/// Set by the service on the final PATCH once the file is assembled.
pub const HEADER_REMOTE_FILE_ID: &str = "putio-file-id";
pub const HEADER_REMOTE_FILE_CRC32: &str = "putio-file-crc32";

/// Content type of every PATCH body.
pub const OFFSET_CONTENT_TYPE: &str = "application/offset+octet-stream";

// Metadata keys.
pub const META_NAME: &str = "name";
pub const META_TYPE: &str = "type";
pub const META_PARENT_ID: &str = "parent_id";
pub const META_CALLBACK_URL: &str = "callback_url";
