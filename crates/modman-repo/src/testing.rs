//! Shared fixtures for unit tests.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use reqwest::Url;

use crate::error::Result;
use crate::repository::RemoteRepository;
use crate::transport::{FileTransport, Progress, Transport};

const SAMPLE_ARTIFACT_METADATA: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata>
  <groupId>org.terasology.modules</groupId>
  <artifactId>Sample</artifactId>
  <versioning>
    <latest>0.1.0-SNAPSHOT</latest>
    <versions>
      <version>0.1.0-SNAPSHOT</version>
    </versions>
    <lastUpdated>20140601101010</lastUpdated>
  </versioning>
</metadata>
"#;

const SAMPLE_VERSION_METADATA: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata>
  <groupId>org.terasology.modules</groupId>
  <artifactId>Sample</artifactId>
  <version>0.1.0-SNAPSHOT</version>
  <versioning>
    <snapshot>
      <timestamp>20140601.101010</timestamp>
      <buildNumber>2</buildNumber>
    </snapshot>
    <lastUpdated>20140601101010</lastUpdated>
    <snapshotVersions>
      <snapshotVersion>
        <extension>jar</extension>
        <value>0.1.0-20140601.101010-2</value>
        <updated>20140601101010</updated>
      </snapshotVersion>
      <snapshotVersion>
        <extension>pom</extension>
        <value>0.1.0-20140601.101010-2</value>
        <updated>20140601101010</updated>
      </snapshotVersion>
    </snapshotVersions>
  </versioning>
</metadata>
"#;

const SAMPLE_POM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project>
  <modelVersion>4.0.0</modelVersion>
  <groupId>org.terasology.modules</groupId>
  <artifactId>Sample</artifactId>
  <version>0.1.0-SNAPSHOT</version>
</project>
"#;

const COPPER_ARTIFACT_METADATA: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata>
  <groupId>org.terasology.modules</groupId>
  <artifactId>CopperAndBronze</artifactId>
  <versioning>
    <versions>
      <version>0.1.0-SNAPSHOT</version>
    </versions>
  </versioning>
</metadata>
"#;

const COPPER_POM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project>
  <modelVersion>4.0.0</modelVersion>
  <groupId>org.terasology.modules</groupId>
  <artifactId>CopperAndBronze</artifactId>
  <version>0.1.0-SNAPSHOT</version>
  <dependencies>
    <dependency>
      <groupId>org.terasology.engine</groupId>
      <artifactId>engine</artifactId>
      <version>1.0.0</version>
    </dependency>
  </dependencies>
</project>
"#;

const CORE_ARTIFACT_METADATA: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata>
  <groupId>org.terasology.modules</groupId>
  <artifactId>Core</artifactId>
  <versioning>
    <latest>2.0.0-rc1</latest>
    <release>1.0.0</release>
    <versions>
      <version>2.0.0-rc1</version>
      <version>0.9.0</version>
      <version>1.0.0</version>
    </versions>
  </versioning>
</metadata>
"#;

const CORE_POM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project>
  <modelVersion>4.0.0</modelVersion>
  <groupId>org.terasology.modules</groupId>
  <artifactId>Core</artifactId>
  <version>1.0.0</version>
</project>
"#;

fn put(root: &Path, relative: &str, content: &[u8]) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// Populate `root` with a small repository and return it as `fixture`.
///
/// * `Sample` 0.1.0-SNAPSHOT, timestamped builds 1 and 2; metadata names build 2.
/// * `CopperAndBronze` 0.1.0-SNAPSHOT, plain snapshot files, depends on `engine`.
/// * `Core` releases 0.9.0, 1.0.0 and 2.0.0-rc1; only 1.0.0 has files.
pub(crate) fn fixture_repository(root: &Path) -> RemoteRepository {
    let base = "org/terasology/modules";
    put(root, &format!("{base}/Sample/maven-metadata.xml"), SAMPLE_ARTIFACT_METADATA.as_bytes());
    put(
        root,
        &format!("{base}/Sample/0.1.0-SNAPSHOT/maven-metadata.xml"),
        SAMPLE_VERSION_METADATA.as_bytes(),
    );
    put(
        root,
        &format!("{base}/Sample/0.1.0-SNAPSHOT/Sample-0.1.0-20140601.101010-1.jar"),
        b"sample build 1",
    );
    put(
        root,
        &format!("{base}/Sample/0.1.0-SNAPSHOT/Sample-0.1.0-20140601.101010-2.jar"),
        b"sample build 2",
    );
    put(
        root,
        &format!("{base}/Sample/0.1.0-SNAPSHOT/Sample-0.1.0-20140601.101010-2.pom"),
        SAMPLE_POM.as_bytes(),
    );

    put(
        root,
        &format!("{base}/CopperAndBronze/maven-metadata.xml"),
        COPPER_ARTIFACT_METADATA.as_bytes(),
    );
    put(
        root,
        &format!("{base}/CopperAndBronze/0.1.0-SNAPSHOT/CopperAndBronze-0.1.0-SNAPSHOT.pom"),
        COPPER_POM.as_bytes(),
    );
    put(
        root,
        &format!("{base}/CopperAndBronze/0.1.0-SNAPSHOT/CopperAndBronze-0.1.0-SNAPSHOT.jar"),
        b"copper",
    );

    put(root, &format!("{base}/Core/maven-metadata.xml"), CORE_ARTIFACT_METADATA.as_bytes());
    put(root, &format!("{base}/Core/1.0.0/Core-1.0.0.pom"), CORE_POM.as_bytes());
    put(root, &format!("{base}/Core/1.0.0/Core-1.0.0.jar"), b"core 1.0.0");

    empty_repository("fixture", root)
}

/// A `file://` repository rooted at `root`, created empty.
pub(crate) fn empty_repository(id: &str, root: &Path) -> RemoteRepository {
    std::fs::create_dir_all(root).unwrap();
    let url = Url::from_directory_path(root).unwrap();
    RemoteRepository::new(id, url.as_str()).unwrap()
}

/// File transport that counts requests.
#[derive(Debug, Clone, Default)]
pub(crate) struct CountingTransport {
    requests: Arc<AtomicUsize>,
}

impl CountingTransport {
    pub(crate) fn count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Transport for CountingTransport {
    fn get(&self, url: &Url, progress: &mut Progress<'_>) -> Result<Option<Vec<u8>>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        FileTransport.get(url, progress)
    }
}
