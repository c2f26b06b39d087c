pub mod adapter;
pub mod decode;
pub mod output;
pub mod stream;
pub mod tap;
pub mod visualizer;
pub mod wav;

pub use adapter::{CodecSupport, FormatAdapter, MediaReader, PlaybackSource};
pub use decode::StereoBuffers;
pub use output::{AudioOutput, LoadTicket, OutputEvent, RodioOutput};
pub use stream::Download;
pub use tap::SampleTap;
pub use wav::SampleFormat;
