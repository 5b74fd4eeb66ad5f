//! Request handlers over one shared, immutable service.

use pixelflow_core::files::{CompressRequest, ConvertRequest, CropRequest, ResizeRequest};
use pixelflow_core::{
    codec, ErrorKind, FileTransformService, ImageStore, Pipeline, PipelineResult,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::capabilities::Capabilities;
use crate::config::ServiceConfig;
use crate::dto::{ErrorBody, Envelope, FileOutput, Message, ProcessOutput, ProcessRequest, Request};

/// Any response the service can produce.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Process(Envelope<ProcessOutput>),
    File(Envelope<FileOutput>),
    Message(Envelope<Message>),
    Capabilities(Capabilities),
}

impl Reply {
    pub fn is_success(&self) -> bool {
        match self {
            Self::Process(e) => e.is_success(),
            Self::File(e) => e.is_success(),
            Self::Message(e) => e.is_success(),
            Self::Capabilities(_) => true,
        }
    }

    pub fn error(&self) -> Option<&ErrorBody> {
        match self {
            Self::Process(e) => e.error(),
            Self::File(e) => e.error(),
            Self::Message(e) => e.error(),
            Self::Capabilities(_) => None,
        }
    }
}

/// Pipeline plus file transforms, shareable across threads.
pub struct ImageService<S> {
    pipeline: Pipeline,
    files: FileTransformService<S>,
}

impl<S: ImageStore> ImageService<S> {
    pub fn new(config: &ServiceConfig, store: S) -> Self {
        Self {
            pipeline: Pipeline::new(config.pipeline_config()),
            files: FileTransformService::new(store, config.file_settings()),
        }
    }

    pub fn files(&self) -> &FileTransformService<S> {
        &self.files
    }

    pub fn health(&self) -> Envelope<Message> {
        Envelope::Success(Message {
            message: "Server is running".to_string(),
        })
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities
    }

    /// Run an operation list over an inline image.
    pub fn process(&self, request: ProcessRequest) -> Envelope<ProcessOutput> {
        let Some(image) = request.image.as_deref().filter(|s| !s.trim().is_empty()) else {
            return Envelope::invalid_request("No image provided");
        };
        let Some(steps) = request.steps() else {
            return Envelope::invalid_request("No operations provided");
        };
        debug!(steps = steps.len(), "process request");

        into_envelope(self.pipeline.run(image, &steps))
    }

    /// Parse and dispatch a raw JSON process request.
    pub fn process_json(&self, value: Value) -> Envelope<ProcessOutput> {
        match serde_json::from_value::<ProcessRequest>(value) {
            Ok(request) => self.process(request),
            Err(err) => Envelope::invalid_request(format!("Malformed request: {err}")),
        }
    }

    pub fn compress(&self, request: &CompressRequest) -> Envelope<FileOutput> {
        self.files.compress(request).map(FileOutput).into()
    }

    pub fn resize(&self, request: &ResizeRequest) -> Envelope<FileOutput> {
        self.files.resize(request).map(FileOutput).into()
    }

    pub fn crop(&self, request: &CropRequest) -> Envelope<FileOutput> {
        self.files.crop(request).map(FileOutput).into()
    }

    pub fn convert(&self, request: &ConvertRequest) -> Envelope<FileOutput> {
        self.files.convert_to_jpg(request).map(FileOutput).into()
    }

    pub fn handle(&self, request: Request) -> Reply {
        let reply = match request {
            Request::Process(r) => Reply::Process(self.process(r)),
            Request::Filters => Reply::Capabilities(self.capabilities()),
            Request::Health => Reply::Message(self.health()),
            Request::Compress(r) => Reply::File(self.compress(&r)),
            Request::Resize(r) => Reply::File(self.resize(&r)),
            Request::Crop(r) => Reply::File(self.crop(&r)),
            Request::Convert(r) => Reply::File(self.convert(&r)),
        };
        if let Some(err) = reply.error() {
            warn!(kind = %err.kind, message = %err.message, "request failed");
        }
        reply
    }

    /// Parse a `{"command": ...}` request and dispatch it.
    pub fn handle_json(&self, value: Value) -> Reply {
        match serde_json::from_value::<Request>(value) {
            Ok(request) => self.handle(request),
            Err(err) => Reply::Message(Envelope::invalid_request(format!(
                "Malformed request: {err}"
            ))),
        }
    }
}

fn into_envelope(result: PipelineResult) -> Envelope<ProcessOutput> {
    match (result.data_uri(), result.error_kind) {
        (Some(image), None) => Envelope::Success(ProcessOutput {
            image,
            width: result.width,
            height: result.height,
            steps: result.steps,
        }),
        (_, kind) => Envelope::Error(ErrorBody {
            kind: kind.unwrap_or(ErrorKind::EncodeError).as_str().to_string(),
            message: result.message.unwrap_or_default(),
            steps: result.steps,
        }),
    }
}

/// Inline form of raw image bytes for a process request.
pub fn inline_image(bytes: &[u8]) -> String {
    codec::to_base64(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixelflow_core::{MemoryStore, OutputFormat, RasterImage};
    use serde_json::json;

    fn service() -> ImageService<MemoryStore> {
        ImageService::new(&ServiceConfig::default(), MemoryStore::new())
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RasterImage::filled(width, height, [30, 140, 220]);
        codec::encode(&img, OutputFormat::Png).unwrap()
    }

    #[test]
    fn test_health_message() {
        let value = serde_json::to_value(service().health()).unwrap();
        assert_eq!(value, json!({"status": "success", "message": "Server is running"}));
    }

    #[test]
    fn test_process_success_shape() {
        let svc = service();
        let reply = svc.process_json(json!({
            "image": inline_image(&png(8, 6)),
            "operations": [
                {"type": "threshold", "params": {"method": "otsu"}},
                {"type": "nope"}
            ]
        }));
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["status"], "success");
        assert!(value["image"].as_str().unwrap().starts_with("data:image/png;base64,"));
        assert_eq!(value["width"], 8);
        assert_eq!(value["steps"][0]["status"], "applied");
        assert_eq!(value["steps"][0]["method"], "otsu");
        assert_eq!(value["steps"][1]["status"], "skipped");
        assert_eq!(value["steps"][1]["kind"], "unknown_family");
    }

    #[test]
    fn test_malformed_step_skipped_others_kept() {
        let svc = service();
        let image = inline_image(&png(8, 6));
        for bad in [
            json!({"type": "threshold", "params": null}),
            json!("oops"),
            json!({"type": 5, "params": {}}),
            json!({"type": "threshold", "method": 7}),
            json!({"type": "threshold", "params": [1, 2]}),
        ] {
            let reply = svc.process_json(json!({
                "image": image,
                "operations": [{"type": "threshold", "params": {"method": "otsu"}}, bad]
            }));
            let value = serde_json::to_value(&reply).unwrap();
            assert_eq!(value["status"], "success", "{bad}");
            assert_eq!(value["steps"][0]["status"], "applied", "{bad}");
            assert_eq!(value["steps"][1]["status"], "skipped", "{bad}");
            assert_eq!(value["steps"][1]["kind"], "invalid_parameter", "{bad}");
            assert_eq!(value["steps"][1]["index"], 1);
        }
    }

    #[test]
    fn test_missing_params_uses_defaults() {
        let reply = service().process_json(json!({
            "image": inline_image(&png(4, 4)),
            "operations": [{"type": "threshold"}]
        }));
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["steps"][0]["status"], "applied");
        assert_eq!(value["steps"][0]["method"], "binary");
    }

    #[test]
    fn test_process_missing_fields_is_invalid_request() {
        let svc = service();
        for request in [
            json!({"operations": []}),
            json!({"image": "", "operations": []}),
            json!({"image": inline_image(&png(2, 2))}),
            json!({"image": 42, "operations": []}),
        ] {
            let reply = svc.process_json(request.clone());
            assert_eq!(reply.error().unwrap().kind, "invalid_request", "{request}");
        }
    }

    #[test]
    fn test_process_decode_error() {
        let reply = service().process_json(json!({"image": "bm90IGFuIGltYWdl", "operations": []}));
        assert_eq!(reply.error().unwrap().kind, "decode_error");
    }

    #[test]
    fn test_file_commands_through_handle() {
        let svc = service();
        svc.files().store().write("a.png", &png(20, 10)).unwrap();

        let reply = svc.handle_json(json!({"command": "compress", "key": "a.png"}));
        assert!(reply.is_success());
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["filename"], "compress_a.jpg");
        assert!(value["compressed_size"].is_number());

        let reply = svc.handle_json(json!({"command": "crop", "key": "a.png", "left": 5, "top": 0, "right": 5, "bottom": 4}));
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["kind"], "invalid_parameter");

        let reply = svc.handle_json(json!({"command": "convert", "key": "missing.png"}));
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["kind"], "not_found");
    }

    #[test]
    fn test_unknown_command_is_invalid_request() {
        let reply = service().handle_json(json!({"command": "explode"}));
        assert!(!reply.is_success());
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["kind"], "invalid_request");
    }

    #[test]
    fn test_filters_listing_through_handle() {
        let reply = service().handle_json(json!({"command": "filters"}));
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["threshold"]["default_method"], "binary");
    }

    #[test]
    fn test_service_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ImageService<MemoryStore>>();
        assert_send_sync::<ImageService<pixelflow_core::FsStore>>();
    }
}
