// Local test server in the spirit of reqwest's test support: a hyper server
// on its own thread with a current-thread runtime, plus hit accounting so
// retry tests can assert exactly how many attempts arrived.
use std::convert::Infallible;
use std::future::Future;
use std::net;
use std::sync::{Arc, Mutex};
use std::thread;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::service::service_fn;
use hyper::{Request, Response};
use tokio::runtime;
use tokio::sync::oneshot;

pub type Body = Full<Bytes>;
type Builder = hyper_util::server::conn::auto::Builder<hyper_util::rt::TokioExecutor>;

pub struct Server {
    addr: net::SocketAddr,
    completed_hits: Arc<Mutex<usize>>,
    total_hits: Arc<Mutex<usize>>,
    no_hit_checks: bool,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl Server {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Assert that exactly `hits` requests were served to completion.
    pub fn assert_hits(&self, hits: usize) {
        assert_eq!(*self.completed_hits.lock().unwrap(), hits);
    }

    /// For tests that abandon requests midway (timeouts, cancellation).
    pub fn disable_hit_checks(&mut self) {
        self.no_hit_checks = true;
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if !thread::panicking() && !self.no_hit_checks {
            let total = *self.total_hits.lock().unwrap();
            let completed = *self.completed_hits.lock().unwrap();
            assert!(total > 0, "test server exited without being called");
            assert_eq!(
                total - completed,
                0,
                "some requests panicked or were abandoned mid-flight"
            );
        }
    }
}

// Only http() is generic; every closure is its own type and a generic
// server body would be recompiled for each one, slowing test builds.
pub fn http<F, Fut>(func: F) -> Server
where
    F: Fn(Request<hyper::body::Incoming>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response<Body>> + Send + 'static,
{
    http_inner(Arc::new(move |req| Box::new(Box::pin(func(req)))))
}

type Serv = dyn Fn(Request<hyper::body::Incoming>) -> Box<ServFut> + Send + Sync;
type ServFut = dyn Future<Output = Response<Body>> + Send + Unpin;

fn http_inner(func: Arc<Serv>) -> Server {
    // The server gets its own runtime on its own thread so tests stay
    // plain blocking code.
    thread::spawn(move || {
        let rt = runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("new rt");
        let completed_hits = Arc::new(Mutex::new(0));
        let total_hits = Arc::new(Mutex::new(0));
        let listener = rt.block_on(async {
            tokio::net::TcpListener::bind(&net::SocketAddr::from(([127, 0, 0, 1], 0)))
                .await
                .unwrap()
        });
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        {
            let completed_hits = completed_hits.clone();
            let total_hits = total_hits.clone();
            thread::spawn(move || {
                let task = rt.spawn(async move {
                    let builder = Builder::new(hyper_util::rt::TokioExecutor::new());
                    loop {
                        let svc = {
                            let func = func.clone();
                            let completed_hits = completed_hits.clone();
                            let total_hits = total_hits.clone();

                            service_fn(move |req| {
                                let completed_hits = completed_hits.clone();
                                let total_hits = total_hits.clone();
                                let fut = func(req);
                                async move {
                                    *total_hits.lock().unwrap() += 1;
                                    let res = fut.await;
                                    *completed_hits.lock().unwrap() += 1;
                                    Ok::<_, Infallible>(res)
                                }
                            })
                        };

                        let (io, _) = listener.accept().await.unwrap();

                        let builder = builder.clone();
                        tokio::spawn(async move {
                            let _ = builder
                                .serve_connection(hyper_util::rt::TokioIo::new(io), svc)
                                .await;
                        });
                    }
                });
                let _ = rt.block_on(shutdown_rx);
                task.abort();
            });
        }
        Server {
            addr,
            completed_hits,
            total_hits,
            no_hit_checks: false,
            shutdown_tx: Some(shutdown_tx),
        }
    })
    .join()
    .unwrap()
}
