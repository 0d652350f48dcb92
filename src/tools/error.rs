/// Generic PCEP Error
#[derive(Debug)]
pub struct PcepError(pub std::io::Error);

///
pub type Result<T> = std::result::Result<T, PcepError>;

impl PcepError {
    /// Return a new PCEP Error with a message
    pub fn new<E>(msg: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>> + std::fmt::Debug,
    {
        log::error!("{:?}", msg);
        PcepError(std::io::Error::new(std::io::ErrorKind::Other, msg))
    }

    /// Return a new PCEP Error
    pub fn new_kind<E>(kind: std::io::ErrorKind, msg: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>> + std::fmt::Debug,
    {
        log::error!("{:?}", msg);
        PcepError(std::io::Error::new(kind, msg))
    }
}

impl std::fmt::Display for PcepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for PcepError {}

impl From<std::io::Error> for PcepError {
    fn from(err: std::io::Error) -> Self {
        log::error!("{:?}", err);
        PcepError(err)
    }
}
