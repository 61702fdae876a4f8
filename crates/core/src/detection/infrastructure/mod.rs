pub mod onnx_yunet_detector;
